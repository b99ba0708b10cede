//! Entry-start pattern detection for multi-line grouping.
//!
//! A container's log format is learned from its first lines: every line is
//! tested against a set of strict (anchored) patterns and, failing those, a
//! set of flexible ones that allow a short prefix. Patterns seen often enough
//! become the container's entry-start patterns. Until one qualifies the
//! container is treated as single-line.

use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use tracing::{debug, info, warn};

/// Lines examined before detection stops for good.
pub const DETECTION_LINE_LIMIT: usize = 300;
/// Lines taken from the container's history when a stream opens.
pub const DETECTION_TAIL_LINES: usize = 100;
const MIN_HITS: usize = 5;
/// 7.5% of the scanned lines, as a per-mille value.
const HIT_RATIO_PER_MILLE: usize = 75;

const LEVELS: &str = "TRACE|DEBUG|INFO|NOTICE|WARN|WARNING|ERROR|ERR|CRITICAL|CRIT|FATAL|PANIC";

fn strict_sources() -> Vec<(&'static str, String)> {
    vec![
        ("iso-datetime", r"^\[?\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}".to_string()),
        ("slash-date", r"^\[?\d{4}/\d{2}/\d{2}[ T]\d{2}:\d{2}:\d{2}".to_string()),
        ("day-first-date", r"^\[?\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4}[ T,]+\d{1,2}:\d{2}:\d{2}".to_string()),
        ("common-log-date", r"^\[?\d{2}/[A-Z][a-z]{2}/\d{4}:\d{2}:\d{2}:\d{2}".to_string()),
        ("syslog-date", r"^[A-Z][a-z]{2} [ \d]\d \d{2}:\d{2}:\d{2}".to_string()),
        ("time-of-day", r"^\[?\d{2}:\d{2}:\d{2}".to_string()),
        ("level-prefix", format!(r"^\[?(?:{})\b", LEVELS)),
    ]
}

fn flex_sources() -> Vec<(&'static str, String)> {
    vec![
        ("prefixed-iso-datetime", r"^.{0,20}\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}".to_string()),
        ("prefixed-time-of-day", r"^.{0,20}\b\d{2}:\d{2}:\d{2}".to_string()),
        ("prefixed-level", format!(r"^.{{0,20}}\b(?:{})\b", LEVELS)),
    ]
}

struct Candidate {
    name: &'static str,
    matcher: RegexMatcher,
    hits: usize,
    selected: bool,
}

impl Candidate {
    fn compile(name: &'static str, source: &str) -> Option<Self> {
        match RegexMatcherBuilder::new().multi_line(false).build(source) {
            Ok(matcher) => Some(Self {
                name,
                matcher,
                hits: 0,
                selected: false,
            }),
            Err(e) => {
                warn!(pattern = name, error = %e, "Built-in start pattern failed to compile");
                None
            }
        }
    }

    fn is_match(&self, line: &str) -> bool {
        self.matcher.is_match(line.as_bytes()).unwrap_or(false)
    }
}

pub struct PatternDetector {
    entity: String,
    strict: Vec<Candidate>,
    flex: Vec<Candidate>,
    scanned: usize,
}

impl PatternDetector {
    pub fn new(entity: &str) -> Self {
        let compile = |sources: Vec<(&'static str, String)>| -> Vec<Candidate> {
            sources
                .into_iter()
                .filter_map(|(name, source)| Candidate::compile(name, &source))
                .collect()
        };
        Self {
            entity: entity.to_string(),
            strict: compile(strict_sources()),
            flex: compile(flex_sources()),
            scanned: 0,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanned < DETECTION_LINE_LIMIT
    }

    pub fn has_patterns(&self) -> bool {
        self.candidates().any(|c| c.selected)
    }

    pub fn selected(&self) -> Vec<&'static str> {
        self.candidates().filter(|c| c.selected).map(|c| c.name).collect()
    }

    /// Whether `line` begins a new entry according to the detected patterns.
    pub fn is_entry_start(&self, line: &str) -> bool {
        self.candidates().any(|c| c.selected && c.is_match(line))
    }

    /// Count `line` towards detection. No-op once the scan limit is reached.
    pub fn observe(&mut self, line: &str) {
        if !self.is_scanning() {
            return;
        }
        self.scanned += 1;

        let hit = self
            .strict
            .iter_mut()
            .find(|c| c.is_match(line))
            .or_else(|| self.flex.iter_mut().find(|c| c.is_match(line)));
        if let Some(candidate) = hit {
            candidate.hits += 1;
        }

        let threshold = MIN_HITS.max(self.scanned * HIT_RATIO_PER_MILLE / 1000);
        let (entity, scanned) = (&self.entity, self.scanned);
        for candidate in self.strict.iter_mut().chain(self.flex.iter_mut()) {
            if !candidate.selected && candidate.hits > threshold {
                candidate.selected = true;
                debug!(
                    container = %entity,
                    pattern = candidate.name,
                    hits = candidate.hits,
                    scanned,
                    "Found entry start pattern"
                );
            }
        }

        if !self.is_scanning() && !self.has_patterns() {
            info!(
                container = %self.entity,
                lines = DETECTION_LINE_LIMIT,
                "No entry start pattern found, using single-line mode"
            );
        }
    }

    /// Feed a block of history (e.g. the tail read when a stream opens).
    pub fn observe_block(&mut self, text: &str) {
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            self.observe(line);
        }
    }

    fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.strict.iter().chain(self.flex.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: &mut PatternDetector, lines: &[&str], times: usize) {
        for _ in 0..times {
            for line in lines {
                detector.observe(line);
            }
        }
    }

    #[test]
    fn test_all_builtin_patterns_compile() {
        let detector = PatternDetector::new("web");
        assert_eq!(detector.strict.len(), strict_sources().len());
        assert_eq!(detector.flex.len(), flex_sources().len());
    }

    #[test]
    fn test_iso_timestamps_detected() {
        let mut detector = PatternDetector::new("web");
        feed(&mut detector, &["2026-02-05 10:00:00 INFO started", "    at continuation"], 6);

        assert!(detector.has_patterns());
        assert_eq!(detector.selected(), vec!["iso-datetime"]);
        assert!(detector.is_entry_start("2026-02-05T11:00:00Z ERROR x"));
        assert!(!detector.is_entry_start("    at com.example.Main"));
    }

    #[test]
    fn test_threshold_needs_more_than_five_hits() {
        let mut detector = PatternDetector::new("web");
        feed(&mut detector, &["12:00:01 tick"], 5);
        assert!(!detector.has_patterns());
        detector.observe("12:00:02 tick");
        assert!(detector.has_patterns());
    }

    #[test]
    fn test_threshold_scales_with_scanned_lines() {
        let mut detector = PatternDetector::new("web");
        // After 200 unstructured lines the threshold sits at 16.
        feed(&mut detector, &["plain text"], 200);
        feed(&mut detector, &["INFO ready"], 16);
        assert!(!detector.has_patterns());
        detector.observe("INFO ready");
        assert!(detector.has_patterns());
    }

    #[test]
    fn test_flex_pattern_with_prefix() {
        let mut detector = PatternDetector::new("web");
        feed(&mut detector, &["web-1  | 2026-02-05 10:00:00 started"], 6);
        assert_eq!(detector.selected(), vec!["prefixed-iso-datetime"]);
    }

    #[test]
    fn test_scan_stops_at_limit() {
        let mut detector = PatternDetector::new("web");
        feed(&mut detector, &["no structure here"], DETECTION_LINE_LIMIT);
        assert!(!detector.is_scanning());
        feed(&mut detector, &["2026-02-05 10:00:00 late"], 20);
        assert!(!detector.has_patterns());
    }

    #[test]
    fn test_observe_block_skips_blank_lines() {
        let mut detector = PatternDetector::new("web");
        detector.observe_block("a\n\n  \nb\n");
        assert_eq!(detector.scanned, 2);
    }
}
