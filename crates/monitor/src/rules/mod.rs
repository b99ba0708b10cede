//! Rules module — compiled rules, matching, message templates.

pub mod matcher;
pub mod template;

use std::fmt;
use std::sync::Arc;

use crate::action::ActionKind;
use crate::conf::model::Overrides;
use crate::conf::snapshot::EffectiveSettings;
use crate::filter::Pattern;
use template::MessageTemplate;

pub use matcher::{match_entry, LogEntry};

/// Stable identity of a rule: its mode plus its text. Two rules with the
/// same identity are the same rule, whichever list they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(Arc<str>);

impl RuleId {
    pub fn keyword(text: &str) -> Self {
        Self(format!("keyword:{}", text).into())
    }

    pub fn regex(source: &str) -> Self {
        Self(format!("regex:{}", source).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct Rule {
    pub id: RuleId,
    pub pattern: Pattern,
    pub action: Option<ActionKind>,
    pub template: Option<MessageTemplate>,
    /// Rule-level exclusions, active for an entry once this rule matched it.
    pub excluded: Vec<Pattern>,
    /// Raw rule-level settings, resolved per container at snapshot build.
    pub overrides: Overrides,
}

impl Rule {
    /// How the rule is named in notification titles.
    pub fn label(&self, hide_regex: bool) -> String {
        match (&self.pattern, hide_regex) {
            (Pattern::Regex { .. }, true) => "Regex-Pattern".to_string(),
            (Pattern::Regex { source, .. }, false) => format!("Regex: {}", source),
            (Pattern::Keyword { text, .. }, _) => text.clone(),
        }
    }
}

/// A rule in the context of one container: the rule plus the settings
/// resolved for that (container, rule) pair.
#[derive(Debug, Clone)]
pub struct BoundRule {
    pub rule: Arc<Rule>,
    pub settings: Arc<EffectiveSettings>,
}

/// One triggering rule for one log entry.
#[derive(Debug, Clone)]
pub struct MatchEvent {
    pub entity: Arc<str>,
    pub rule: Arc<Rule>,
    pub settings: Arc<EffectiveSettings>,
    /// Rule name as shown in titles.
    pub label: String,
    /// Rendered template, or `None` when the rule has no template or it
    /// could not be filled.
    pub rendered: Option<String>,
    pub entry: Arc<str>,
    pub timestamp: i64,
    pub line_count: usize,
}
