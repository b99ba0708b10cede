use std::collections::HashMap;

use grep_matcher::{Captures, Matcher};
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("Empty keyword")]
    EmptyKeyword,
}

/// A log entry prepared for matching. The case-folded copy is computed once
/// and shared by every keyword pattern evaluated against the entry.
pub struct Haystack<'a> {
    raw: &'a str,
    folded: String,
}

impl<'a> Haystack<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            folded: raw.to_lowercase(),
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }
}

/// One matching mode: a substring keyword or a compiled regex searched
/// anywhere in the entry.
#[derive(Debug, Clone)]
pub enum Pattern {
    Keyword {
        text: String,
        folded: String,
        case_sensitive: bool,
    },
    Regex {
        source: String,
        matcher: RegexMatcher,
    },
}

impl Pattern {
    pub fn keyword(text: &str, case_sensitive: bool) -> Result<Self, FilterError> {
        if text.is_empty() {
            return Err(FilterError::EmptyKeyword);
        }
        Ok(Pattern::Keyword {
            text: text.to_string(),
            folded: text.to_lowercase(),
            case_sensitive,
        })
    }

    pub fn regex(source: &str, case_sensitive: bool) -> Result<Self, FilterError> {
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(!case_sensitive)
            .multi_line(false)
            .build(source)
            .map_err(|e| FilterError::InvalidRegex {
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Pattern::Regex {
            source: source.to_string(),
            matcher,
        })
    }

    /// The keyword text or the regex source.
    pub fn source(&self) -> &str {
        match self {
            Pattern::Keyword { text, .. } => text,
            Pattern::Regex { source, .. } => source,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Pattern::Regex { .. })
    }

    #[inline]
    pub fn is_match(&self, haystack: &Haystack<'_>) -> bool {
        match self {
            Pattern::Keyword {
                text,
                folded,
                case_sensitive,
            } => {
                if *case_sensitive {
                    haystack.raw.contains(text.as_str())
                } else {
                    haystack.folded.contains(folded.as_str())
                }
            }
            Pattern::Regex { matcher, .. } => {
                matcher.is_match(haystack.raw.as_bytes()).unwrap_or(false)
            }
        }
    }

    /// Named capture groups of the first match, restricted to `names`.
    /// Groups that did not participate in the match are left out.
    /// Returns `None` for keywords or when the regex does not match.
    pub fn named_captures(&self, text: &str, names: &[&str]) -> Option<HashMap<String, String>> {
        let Pattern::Regex { matcher, .. } = self else {
            return None;
        };
        let mut caps = matcher.new_captures().ok()?;
        if !matcher.captures(text.as_bytes(), &mut caps).unwrap_or(false) {
            return None;
        }

        let mut groups = HashMap::new();
        for name in names {
            let Some(index) = matcher.capture_index(name) else {
                continue;
            };
            if let Some(m) = caps.get(index) {
                groups.insert(name.to_string(), text[m.start()..m.end()].to_string());
            }
        }
        Some(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &Pattern, line: &str) -> bool {
        pattern.is_match(&Haystack::new(line))
    }

    // ── Keywords ────────────────────────────────────────────────

    #[test]
    fn test_keyword_case_insensitive() {
        let p = Pattern::keyword("error", false).expect("Failed to create pattern");

        assert!(matches(&p, "This is an Error message"));
        assert!(matches(&p, "ERROR: Critical failure"));
        assert!(!matches(&p, "This is a debug message"));
    }

    #[test]
    fn test_keyword_case_sensitive() {
        let p = Pattern::keyword("Error", true).expect("Failed to create pattern");

        assert!(matches(&p, "Error: something"));
        assert!(!matches(&p, "error: something"));
        assert!(!matches(&p, "ERROR: something"));
    }

    #[test]
    fn test_keyword_matches_inside_multiline_entry() {
        let p = Pattern::keyword("timeout", false).expect("Failed to create pattern");
        assert!(matches(&p, "request failed\n  cause: Timeout after 5s\n  retrying"));
    }

    #[test]
    fn test_empty_keyword_rejected() {
        assert!(matches!(Pattern::keyword("", false), Err(FilterError::EmptyKeyword)));
    }

    // ── Regex ───────────────────────────────────────────────────

    #[test]
    fn test_regex_is_search_not_full_match() {
        let p = Pattern::regex(r"user \d+ failed", false).expect("Failed to create pattern");

        assert!(matches(&p, "2026-01-01 WARN user 42 failed to log in"));
        assert!(!matches(&p, "user admin failed"));
    }

    #[test]
    fn test_regex_case_insensitive_by_default() {
        let p = Pattern::regex("panic", false).expect("Failed to create pattern");
        assert!(matches(&p, "thread 'main' PANICKED"));
    }

    #[test]
    fn test_invalid_regex() {
        let result = Pattern::regex("[invalid", true);
        assert!(matches!(
            result,
            Err(FilterError::InvalidRegex { ref pattern, .. }) if pattern == "[invalid"
        ));
    }

    #[test]
    fn test_named_captures() {
        let p = Pattern::regex(r"user (?P<user>\w+) from (?P<ip>[\d.]+)", false)
            .expect("Failed to create pattern");

        let groups = p
            .named_captures("login failed: user bob from 10.0.0.7", &["user", "ip", "missing"])
            .expect("expected a match");
        assert_eq!(groups.get("user").map(String::as_str), Some("bob"));
        assert_eq!(groups.get("ip").map(String::as_str), Some("10.0.0.7"));
        assert!(!groups.contains_key("missing"));
    }

    #[test]
    fn test_named_captures_none_for_keyword() {
        let p = Pattern::keyword("user", false).expect("Failed to create pattern");
        assert!(p.named_captures("user bob", &["user"]).is_none());
    }
}
