//! Rule matcher — evaluates one log entry against a container's rule set.

use std::sync::Arc;

use tracing::debug;

use super::MatchEvent;
use crate::conf::snapshot::MonitoredEntity;
use crate::filter::Haystack;

/// A logical log entry: one line, or several grouped lines in multi-line mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub text: String,
    pub line_count: usize,
    pub timestamp: i64,
}

impl LogEntry {
    pub fn single(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            text: text.into(),
            line_count: 1,
            timestamp,
        }
    }
}

/// Evaluate `entry` against the container's merged rule set (own rules
/// first, then global rules, duplicates already removed).
///
/// Returns one event per distinct matching rule. Exclusions are the union of
/// the settings and container lists plus the lists of every rule that
/// matched; any hit drops every event of the entry.
pub fn match_entry(entity: &MonitoredEntity, entry: &LogEntry) -> Vec<MatchEvent> {
    let haystack = Haystack::new(&entry.text);
    let mut shared_entry: Option<Arc<str>> = None;
    let mut events = Vec::new();

    for bound in &entity.rules {
        let rule = &bound.rule;
        if !rule.pattern.is_match(&haystack) {
            continue;
        }

        let text = shared_entry
            .get_or_insert_with(|| Arc::from(entry.text.as_str()))
            .clone();
        let rendered = rule
            .template
            .as_ref()
            .and_then(|t| t.render(&rule.pattern, &entry.text));

        events.push(MatchEvent {
            entity: Arc::clone(&entity.name),
            rule: Arc::clone(rule),
            settings: Arc::clone(&bound.settings),
            label: rule.label(bound.settings.hide_regex_in_title),
            rendered,
            entry: text,
            timestamp: entry.timestamp,
            line_count: entry.line_count,
        });
    }

    if !events.is_empty() {
        let mut exclusions = entity
            .excluded
            .iter()
            .chain(events.iter().flat_map(|e| e.rule.excluded.iter()));
        if let Some(hit) = exclusions.find(|p| p.is_match(&haystack)) {
            debug!(
                container = %entity.name,
                matched = events.len(),
                excluded = hit.source(),
                "Entry ignored by excluded keyword"
            );
            return Vec::new();
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::load::parse_snapshot;

    fn entity(yaml: &str, name: &str) -> Arc<MonitoredEntity> {
        let snapshot = parse_snapshot(yaml).expect("config should compile");
        Arc::clone(snapshot.entity(name).expect("entity should exist"))
    }

    fn labels(events: &[MatchEvent]) -> Vec<String> {
        events.iter().map(|e| e.label.clone()).collect()
    }

    #[test]
    fn test_keyword_substring_single_event() {
        let web = entity("containers:\n  web: [error]\n", "web");
        let events = match_entry(&web, &LogEntry::single("an ERROR occurred, error again", 0));
        assert_eq!(labels(&events), vec!["error"]);
    }

    #[test]
    fn test_no_match_no_event() {
        let web = entity("containers:\n  web: [error]\n", "web");
        assert!(match_entry(&web, &LogEntry::single("all good", 0)).is_empty());
    }

    #[test]
    fn test_entity_rules_before_global_and_deduplicated() {
        let yaml = r#"
containers:
  web:
    keywords: [timeout, error]
global_keywords:
  keywords: [error, panic]
"#;
        let web = entity(yaml, "web");
        let events = match_entry(&web, &LogEntry::single("panic: error after timeout", 0));
        assert_eq!(labels(&events), vec!["timeout", "error", "panic"]);
    }

    #[test]
    fn test_duplicate_rule_first_occurrence_wins() {
        let yaml = r#"
containers:
  web:
    keywords:
      - keyword: error
        notification_cooldown: 60
global_keywords:
  keywords:
    - keyword: error
      notification_cooldown: 1
"#;
        let web = entity(yaml, "web");
        let events = match_entry(&web, &LogEntry::single("error", 0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].settings.notification_cooldown.as_secs(), 60);
    }

    #[test]
    fn test_regex_and_keyword_both_fire() {
        let yaml = r#"
containers:
  web:
    keywords:
      - error
      - regex: 'code=5\d\d'
"#;
        let web = entity(yaml, "web");
        let events = match_entry(&web, &LogEntry::single("error: upstream code=503", 0));
        assert_eq!(labels(&events), vec!["error", r"Regex: code=5\d\d"]);
    }

    #[test]
    fn test_multiline_entry_single_event() {
        let web = entity("containers:\n  web: [refused]\n", "web");
        let entry = LogEntry {
            text: "2026-01-01 12:00:00 ERROR request failed\n  connection refused\n  at db.connect".to_string(),
            line_count: 3,
            timestamp: 0,
        };
        let events = match_entry(&web, &entry);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_count, 3);
    }

    #[test]
    fn test_container_exclusion_drops_entry() {
        let yaml = r#"
containers:
  web:
    keywords: [error, timeout]
    excluded_keywords: [healthcheck]
"#;
        let web = entity(yaml, "web");
        assert!(match_entry(&web, &LogEntry::single("healthcheck error timeout", 0)).is_empty());
        assert_eq!(match_entry(&web, &LogEntry::single("timeout", 0)).len(), 1);
    }

    #[test]
    fn test_settings_exclusion_applies_everywhere() {
        let yaml = r#"
containers:
  web: [error]
settings:
  excluded_keywords:
    - regex: 'GET /health\b'
"#;
        let web = entity(yaml, "web");
        assert!(match_entry(&web, &LogEntry::single("error on GET /health", 0)).is_empty());
    }

    #[test]
    fn test_rule_exclusion_joins_the_union() {
        let yaml = r#"
containers:
  web:
    keywords:
      - keyword: error
        excluded_keywords: [expected]
      - timeout
"#;
        let web = entity(yaml, "web");
        assert!(match_entry(&web, &LogEntry::single("expected error after timeout", 0)).is_empty());
        // The rule did not match, so its exclusions do not apply.
        let events = match_entry(&web, &LogEntry::single("expected timeout", 0));
        assert_eq!(labels(&events), vec!["timeout"]);
    }

    #[test]
    fn test_template_rendered() {
        let yaml = r#"
containers:
  web:
    keywords:
      - regex: 'user (?P<user>\w+) failed'
        template: 'Login failure for {user}'
"#;
        let web = entity(yaml, "web");
        let events = match_entry(&web, &LogEntry::single("auth: user bob failed", 0));
        assert_eq!(events[0].rendered.as_deref(), Some("Login failure for bob"));
    }
}
