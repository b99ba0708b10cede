//! Model — the YAML schema as written by users.
//!
//! These types mirror the file one-to-one, including the legacy shapes
//! (`containers` as a list, a container given as a bare keyword list,
//! `keywords_with_attachment`, `action_keywords`). They are normalised and
//! compiled into a [`super::snapshot::ConfigSnapshot`] before use.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::action::ActionKind;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub containers: Option<ContainersField>,
    pub global_keywords: Option<KeywordsField>,
    pub notifications: NotificationsSection,
    pub settings: Settings,
}

// ── Containers ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContainersField {
    Names(Vec<ScalarText>),
    Map(BTreeMap<String, Option<ContainerField>>),
}

impl Default for ContainersField {
    fn default() -> Self {
        ContainersField::Map(BTreeMap::new())
    }
}

impl ContainersField {
    /// Normalise both shapes into `name -> section`.
    pub fn into_sections(self) -> BTreeMap<String, ContainerSection> {
        match self {
            ContainersField::Names(names) => names
                .into_iter()
                .map(|n| (n.to_string(), ContainerSection::default()))
                .collect(),
            ContainersField::Map(map) => map
                .into_iter()
                .map(|(name, field)| (name, field.map(ContainerField::into_section).unwrap_or_default()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContainerField {
    Keywords(Vec<KeywordEntry>),
    Section(ContainerSection),
}

impl ContainerField {
    pub fn into_section(self) -> ContainerSection {
        match self {
            ContainerField::Keywords(keywords) => ContainerSection {
                keywords: KeywordsSection {
                    keywords,
                    ..Default::default()
                },
                ..Default::default()
            },
            ContainerField::Section(section) => section,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerSection {
    #[serde(flatten)]
    pub keywords: KeywordsSection,
    #[serde(flatten)]
    pub overrides: Overrides,
}

// ── Keywords ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeywordsField {
    List(Vec<KeywordEntry>),
    Section(KeywordsSection),
}

impl KeywordsField {
    pub fn into_section(self) -> KeywordsSection {
        match self {
            KeywordsField::List(keywords) => KeywordsSection {
                keywords,
                ..Default::default()
            },
            KeywordsField::Section(section) => section,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordsSection {
    pub keywords: Vec<KeywordEntry>,
    pub keywords_with_attachment: Vec<KeywordEntry>,
    pub action_keywords: Vec<ActionKeywordEntry>,
}

impl KeywordsSection {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
            && self.keywords_with_attachment.is_empty()
            && self.action_keywords.is_empty()
    }

    /// Flatten the legacy lists into plain keyword entries:
    /// `keywords_with_attachment` gains `attach_logfile: true`,
    /// `action_keywords` gain their action.
    pub fn into_entries(self) -> Vec<KeywordSpec> {
        let mut entries: Vec<KeywordSpec> =
            self.keywords.into_iter().map(KeywordEntry::into_spec).collect();

        entries.extend(self.keywords_with_attachment.into_iter().map(|entry| {
            let mut spec = entry.into_spec();
            spec.overrides.attach_logfile.get_or_insert(true);
            spec
        }));

        for action_entry in self.action_keywords {
            entries.extend(action_entry.into_specs());
        }
        entries
    }
}

/// A keyword or number written directly in a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScalarText {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ScalarText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarText::Text(s) => f.write_str(s),
            ScalarText::Int(i) => write!(f, "{}", i),
            ScalarText::Float(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeywordEntry {
    Plain(ScalarText),
    Detailed(KeywordSpec),
}

impl KeywordEntry {
    pub fn into_spec(self) -> KeywordSpec {
        match self {
            KeywordEntry::Plain(text) => KeywordSpec {
                keyword: Some(text),
                ..Default::default()
            },
            KeywordEntry::Detailed(spec) => spec,
        }
    }
}

/// `keyword:` or `regex:` with optional per-rule settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordSpec {
    pub keyword: Option<ScalarText>,
    pub regex: Option<String>,
    pub action: Option<ActionKind>,
    pub template: Option<String>,
    pub json_template: Option<String>,
    #[serde(flatten)]
    pub overrides: Overrides,
}

/// Legacy `action_keywords` item: `restart: <entry>` or `stop: <entry>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActionKeywordEntry {
    pub restart: Option<KeywordEntry>,
    pub stop: Option<KeywordEntry>,
}

impl ActionKeywordEntry {
    fn into_specs(self) -> Vec<KeywordSpec> {
        let with_action = |entry: KeywordEntry, action: ActionKind| {
            let mut spec = entry.into_spec();
            spec.action = Some(action);
            spec
        };
        let mut specs = Vec::new();
        if let Some(entry) = self.restart {
            specs.push(with_action(entry, ActionKind::Restart));
        }
        if let Some(entry) = self.stop {
            specs.push(with_action(entry, ActionKind::Stop));
        }
        specs
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExcludedEntry {
    Plain(ScalarText),
    Detailed {
        keyword: Option<ScalarText>,
        regex: Option<String>,
    },
}

// ── Overrides ───────────────────────────────────────────────────

/// Settings that can be set per container and per keyword.
/// `None` means "inherit from the next less specific level".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub notification_cooldown: Option<u64>,
    pub action_cooldown: Option<u64>,
    pub attachment_lines: Option<usize>,
    pub attach_logfile: Option<bool>,
    pub notification_title: Option<String>,
    pub hide_regex_in_title: Option<bool>,
    pub excluded_keywords: Option<Vec<ExcludedEntry>>,
    pub ntfy_url: Option<String>,
    pub ntfy_topic: Option<String>,
    pub ntfy_tags: Option<String>,
    pub ntfy_priority: Option<PriorityValue>,
    pub ntfy_token: Option<String>,
    pub ntfy_username: Option<String>,
    pub ntfy_password: Option<String>,
    pub apprise_url: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PriorityValue {
    Number(i64),
    Text(String),
}

// ── Notifications ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationsSection {
    pub ntfy: Option<NtfySection>,
    pub apprise: Option<AppriseSection>,
    pub webhook: Option<WebhookSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NtfySection {
    pub url: Option<String>,
    pub topic: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub priority: Option<PriorityValue>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppriseSection {
    pub url: Option<String>,
    /// Base URL of an Apprise API server used for stateless notifications.
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookSection {
    pub url: Option<String>,
    pub headers: BTreeMap<String, String>,
}

// ── Settings ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub docker_socket: String,
    /// Comma-separated daemon URLs, each optionally `url|label`.
    pub docker_host: String,
    pub multi_line_entries: bool,
    pub multi_line_timeout_ms: u64,
    pub multi_line_max_lines: usize,
    pub case_sensitive: bool,
    pub reload_config: bool,
    pub disable_start_message: bool,
    pub disable_shutdown_message: bool,
    pub disable_config_reload_message: bool,
    pub disable_container_event_message: bool,
    pub attach_logfile: bool,
    pub notification_cooldown: u64,
    pub notification_title: String,
    pub action_cooldown: u64,
    pub attachment_lines: usize,
    pub hide_regex_in_title: bool,
    pub excluded_keywords: Vec<ExcludedEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            docker_socket: String::new(),
            docker_host: String::new(),
            multi_line_entries: true,
            multi_line_timeout_ms: 1000,
            multi_line_max_lines: 200,
            case_sensitive: false,
            reload_config: true,
            disable_start_message: false,
            disable_shutdown_message: false,
            disable_config_reload_message: false,
            disable_container_event_message: false,
            attach_logfile: false,
            notification_cooldown: 5,
            notification_title: "default".to_string(),
            action_cooldown: 300,
            attachment_lines: 20,
            hide_regex_in_title: false,
            excluded_keywords: Vec::new(),
        }
    }
}
