//! Message templates: `{name}` placeholders filled from regex named groups
//! or from the fields of a JSON log line. `{original_log_line}` is always
//! available. `{{` and `}}` are literal braces.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::filter::Pattern;

pub const ORIGINAL_LOG_LINE: &str = "original_log_line";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Malformed template '{template}': {reason}")]
pub struct TemplateError {
    pub template: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Filled from the rule's regex named capture groups.
    Regex,
    /// Filled from the fields of the entry parsed as a JSON object.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field(String),
}

/// A parsed `{name}` format string, independent of where values come from.
/// Also used for notification titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    parts: Vec<Part>,
}

impl Placeholders {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let parts = parse_parts(source).map_err(|reason| TemplateError {
            template: source.to_string(),
            reason,
        })?;
        Ok(Self { parts })
    }

    pub fn fields(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Field(name) => Some(name.as_str()),
                Part::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute every field through `lookup`. Fails with the name of the
    /// first field that has no value.
    pub fn expand(&self, mut lookup: impl FnMut(&str) -> Option<String>) -> Result<String, &str> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Field(name) => out.push_str(&lookup(name.as_str()).ok_or(name.as_str())?),
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct MessageTemplate {
    kind: TemplateKind,
    source: String,
    placeholders: Placeholders,
}

impl MessageTemplate {
    pub fn parse(kind: TemplateKind, source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            kind,
            source: source.to_string(),
            placeholders: Placeholders::parse(source)?,
        })
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fields(&self) -> Vec<&str> {
        self.placeholders.fields()
    }

    /// Render for `entry`. `None` when a placeholder has no value (the
    /// caller then falls back to the raw entry).
    pub fn render(&self, pattern: &Pattern, entry: &str) -> Option<String> {
        let values = match self.kind {
            TemplateKind::Regex => {
                let names: Vec<&str> = self
                    .fields()
                    .into_iter()
                    .filter(|f| *f != ORIGINAL_LOG_LINE)
                    .collect();
                pattern.named_captures(entry, &names)?
            }
            TemplateKind::Json => json_fields(entry)?,
        };
        self.fill(&values, entry)
    }

    fn fill(&self, values: &HashMap<String, String>, entry: &str) -> Option<String> {
        let filled = self.placeholders.expand(|name| match values.get(name) {
            Some(value) => Some(value.clone()),
            None if name == ORIGINAL_LOG_LINE => Some(entry.to_string()),
            None => None,
        });
        match filled {
            Ok(text) => Some(text),
            Err(field) => {
                tracing::warn!(template = %self.source, field = %field, "Template field has no value, using raw log entry");
                None
            }
        }
    }
}

fn json_fields(entry: &str) -> Option<HashMap<String, String>> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(entry.trim()) else {
        tracing::debug!("Entry is not a JSON object, json_template not applied");
        return None;
    };
    Some(
        map.into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect(),
    )
}

fn parse_parts(source: &str) -> Result<Vec<Part>, String> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => return Err("nested '{' in placeholder".to_string()),
                        Some(ch) => name.push(ch),
                        None => return Err("unclosed '{'".to_string()),
                    }
                }
                // Format specs (`{name:>10}`) are accepted and ignored.
                let name = name.split(':').next().unwrap_or_default().trim().to_string();
                if name.is_empty() {
                    return Err("empty placeholder".to_string());
                }
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(Part::Field(name));
            }
            '}' => return Err("unmatched '}'".to_string()),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(src: &str) -> Pattern {
        Pattern::regex(src, false).expect("valid regex")
    }

    // ── Parsing ─────────────────────────────────────────────────

    #[test]
    fn test_parse_fields_and_escapes() {
        let t = MessageTemplate::parse(TemplateKind::Regex, "{{literal}} user={user} ip={ip:>15}").unwrap();
        assert_eq!(t.fields(), vec!["user", "ip"]);
    }

    #[test]
    fn test_parse_rejects_unclosed() {
        let err = MessageTemplate::parse(TemplateKind::Json, "level={level").unwrap_err();
        assert!(err.reason.contains("unclosed"));
    }

    #[test]
    fn test_placeholders_expand_reports_missing_field() {
        let p = Placeholders::parse("{a}-{{b}}-{c}").unwrap();
        let ok = p.expand(|name| Some(name.to_uppercase()));
        assert_eq!(ok.as_deref(), Ok("A-{b}-C"));
        assert_eq!(p.expand(|name| (name == "a").then(|| "x".to_string())), Err("c"));
    }

    #[test]
    fn test_parse_rejects_unmatched_close() {
        assert!(MessageTemplate::parse(TemplateKind::Json, "oops}").is_err());
    }

    // ── Regex templates ─────────────────────────────────────────

    #[test]
    fn test_regex_template_renders_named_groups() {
        let pattern = regex(r"failed login for (?P<user>\w+) from (?P<ip>[\d.]+)");
        let t = MessageTemplate::parse(TemplateKind::Regex, "{user} tried to log in from {ip}").unwrap();

        let rendered = t.render(&pattern, "auth: failed login for alice from 10.1.2.3");
        assert_eq!(rendered.as_deref(), Some("alice tried to log in from 10.1.2.3"));
    }

    #[test]
    fn test_regex_template_original_line() {
        let pattern = regex(r"code=(?P<code>\d+)");
        let t = MessageTemplate::parse(TemplateKind::Regex, "[{code}] {original_log_line}").unwrap();

        let rendered = t.render(&pattern, "request done code=503");
        assert_eq!(rendered.as_deref(), Some("[503] request done code=503"));
    }

    #[test]
    fn test_regex_template_missing_group_falls_back() {
        let pattern = regex(r"code=(?P<code>\d+)");
        let t = MessageTemplate::parse(TemplateKind::Regex, "{status}").unwrap();
        assert!(t.render(&pattern, "code=200").is_none());
    }

    // ── JSON templates ──────────────────────────────────────────

    #[test]
    fn test_json_template_renders_fields() {
        let pattern = Pattern::keyword("error", false).unwrap();
        let t = MessageTemplate::parse(TemplateKind::Json, "{level}: {msg} (status {status})").unwrap();

        let rendered = t.render(&pattern, r#"{"level":"error","msg":"db down","status":500}"#);
        assert_eq!(rendered.as_deref(), Some("error: db down (status 500)"));
    }

    #[test]
    fn test_json_template_non_json_entry_falls_back() {
        let pattern = Pattern::keyword("error", false).unwrap();
        let t = MessageTemplate::parse(TemplateKind::Json, "{msg}").unwrap();
        assert!(t.render(&pattern, "plain error line").is_none());
    }
}
