//! Snapshot — the compiled, validated, immutable configuration.
//!
//! Every regex is compiled and every overridable value is resolved here,
//! once per load, following rule > container > settings > built-in default.
//! The pipeline only ever reads a snapshot; a reload builds a new one and
//! swaps it in whole.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::model::{
    ExcludedEntry, FileConfig, KeywordSpec, NotificationsSection, Overrides, PriorityValue, Settings,
};
use super::ConfigError;
use crate::filter::Pattern;
use crate::notify::target::{AppriseTarget, ChannelSet, NtfyAuth, NtfyTarget, WebhookTarget};
use crate::rules::template::{MessageTemplate, TemplateKind};
use crate::rules::{BoundRule, Rule, RuleId};

/// Actions can never fire more often than this, whatever is configured.
pub const MIN_ACTION_COOLDOWN: Duration = Duration::from_secs(60);

pub const DEFAULT_NTFY_TAGS: &str = "kite,mag";
pub const DEFAULT_NTFY_PRIORITY: &str = "3";
const NTFY_PRIORITY_NAMES: &[&str] = &["max", "urgent", "high", "default", "low", "min"];

/// Settings as they apply to one (container, rule) pair, or to a container
/// or the process as a whole for lifecycle messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub notification_cooldown: Duration,
    pub action_cooldown: Duration,
    pub attachment_lines: usize,
    pub attach_logfile: bool,
    pub notification_title: String,
    pub hide_regex_in_title: bool,
    pub channels: ChannelSet,
}

/// A configured container with its merged rule set.
#[derive(Debug)]
pub struct MonitoredEntity {
    pub name: Arc<str>,
    /// Own rules first, then global rules, each identity once.
    pub rules: Vec<BoundRule>,
    /// Settings-level and container-level exclusions.
    pub excluded: Vec<Pattern>,
    pub settings: Arc<EffectiveSettings>,
}

#[derive(Debug)]
pub struct ConfigSnapshot {
    pub settings: Settings,
    pub defaults: Arc<EffectiveSettings>,
    pub entities: BTreeMap<String, Arc<MonitoredEntity>>,
    pub global_rules: Vec<Arc<Rule>>,
}

impl ConfigSnapshot {
    pub fn compile(file: FileConfig) -> Result<Self, ConfigError> {
        let FileConfig {
            containers,
            global_keywords,
            notifications,
            settings,
        } = file;

        validate_settings(&settings)?;
        validate_notifications(&notifications)?;
        let defaults = Arc::new(resolve(&settings, &notifications, &[]));
        validate_channels(&defaults.channels, "notifications")?;

        let containers = containers.unwrap_or_default().into_sections();
        if containers.is_empty() {
            return Err(ConfigError::Validation(
                "at least one container must be configured".to_string(),
            ));
        }

        let case_sensitive = settings.case_sensitive;
        let global_specs = global_keywords
            .map(|g| g.into_section().into_entries())
            .unwrap_or_default();
        let global_rules = compile_rules(global_specs, "global_keywords", case_sensitive)?;

        let settings_excluded =
            compile_excluded(&settings.excluded_keywords, "settings", case_sensitive)?;

        let mut entities = BTreeMap::new();
        let mut any_rules = !global_rules.is_empty();

        for (name, section) in containers {
            let scope = format!("container '{}'", name);
            let own_rules = compile_rules(section.keywords.into_entries(), &scope, case_sensitive)?;
            let entity_overrides = section.overrides;
            validate_overrides(&entity_overrides, &scope)?;

            let mut seen = HashSet::new();
            let rules: Vec<BoundRule> = own_rules
                .iter()
                .chain(global_rules.iter())
                .filter(|rule| seen.insert(rule.id.clone()))
                .map(|rule| BoundRule {
                    rule: Arc::clone(rule),
                    settings: Arc::new(resolve(
                        &settings,
                        &notifications,
                        &[&rule.overrides, &entity_overrides],
                    )),
                })
                .collect();

            if rules.is_empty() {
                warn!(container = %name, "Container has no keywords and there are no global keywords");
            }
            any_rules |= !own_rules.is_empty();

            let mut excluded = settings_excluded.clone();
            if let Some(list) = &entity_overrides.excluded_keywords {
                excluded.extend(compile_excluded(list, &scope, case_sensitive)?);
            }

            let entity_settings = resolve(&settings, &notifications, &[&entity_overrides]);
            validate_channels(&entity_settings.channels, &scope)?;
            for bound in &rules {
                let rule_scope = format!("{} rule '{}'", scope, bound.rule.pattern.source());
                validate_channels(&bound.settings.channels, &rule_scope)?;
            }

            let entity = MonitoredEntity {
                name: Arc::from(name.as_str()),
                rules,
                excluded,
                settings: Arc::new(entity_settings),
            };
            entities.insert(name, Arc::new(entity));
        }

        if !any_rules {
            return Err(ConfigError::Validation(
                "no keywords configured; set keywords per container or in global_keywords".to_string(),
            ));
        }

        let any_channel = !defaults.channels.is_empty()
            || entities
                .values()
                .flat_map(|e| e.rules.iter())
                .any(|r| !r.settings.channels.is_empty());
        if !any_channel {
            warn!("No notification channel is configured; matches will only be logged");
        }

        Ok(Self {
            settings,
            defaults,
            entities,
            global_rules,
        })
    }

    pub fn entity(&self, name: &str) -> Option<&Arc<MonitoredEntity>> {
        self.entities.get(name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn multiline_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.multi_line_timeout_ms)
    }

    /// One-paragraph description for the startup log; secrets are masked.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "containers=[{}] global_rules={} log_level={} multi_line={} notification_cooldown={}s action_cooldown={}s",
            self.entity_names().collect::<Vec<_>>().join(", "),
            self.global_rules.len(),
            self.settings.log_level,
            self.settings.multi_line_entries,
            self.defaults.notification_cooldown.as_secs(),
            self.defaults.action_cooldown.as_secs(),
        );
        let channels = &self.defaults.channels;
        if let Some(ntfy) = &channels.ntfy {
            let auth = match ntfy.auth {
                Some(NtfyAuth::Bearer(_)) => "token=****",
                Some(NtfyAuth::Basic { .. }) => "basic=****",
                None => "no-auth",
            };
            let _ = write!(out, " ntfy={}/{} ({})", ntfy.url, ntfy.topic, auth);
        }
        if channels.apprise.is_some() {
            let _ = write!(out, " apprise=****");
        }
        if let Some(webhook) = &channels.webhook {
            let _ = write!(out, " webhook={} headers={}", webhook.url, webhook.headers.len());
        }
        out
    }
}

// ── Rule compilation ────────────────────────────────────────────

fn compile_rules(
    specs: Vec<KeywordSpec>,
    scope: &str,
    case_sensitive: bool,
) -> Result<Vec<Arc<Rule>>, ConfigError> {
    let mut index: HashMap<RuleId, usize> = HashMap::new();
    let mut rules: Vec<Rule> = Vec::with_capacity(specs.len());
    for spec in specs {
        let rule = compile_rule(spec, scope, case_sensitive)?;
        match index.get(&rule.id) {
            Some(&at) => absorb_duplicate(&mut rules[at], rule, scope),
            None => {
                index.insert(rule.id.clone(), rules.len());
                rules.push(rule);
            }
        }
    }
    Ok(rules.into_iter().map(Arc::new).collect())
}

/// The same keyword listed twice (e.g. in `keywords` and in
/// `keywords_with_attachment`) is one rule. The first entry keeps its
/// settings; the attachment flag and the action of a later entry are
/// carried over when the first leaves them unset.
fn absorb_duplicate(first: &mut Rule, later: Rule, scope: &str) {
    if first.overrides.attach_logfile.is_none() && later.overrides.attach_logfile.is_some() {
        first.overrides.attach_logfile = later.overrides.attach_logfile;
    }
    match (first.action, later.action) {
        (None, Some(action)) => first.action = Some(action),
        (Some(kept), Some(dropped)) if kept != dropped => {
            warn!(scope, rule = %first.id, kept = %kept, dropped = %dropped, "Rule listed twice with different actions, keeping the first");
        }
        _ => {}
    }
    debug!(scope, rule = %first.id, "Duplicate rule merged into its first occurrence");
}

fn compile_rule(spec: KeywordSpec, scope: &str, case_sensitive: bool) -> Result<Rule, ConfigError> {
    let KeywordSpec {
        keyword,
        regex,
        action,
        template,
        json_template,
        overrides,
    } = spec;

    let (id, pattern) = match (keyword, regex) {
        (Some(_), Some(regex)) => {
            return Err(ConfigError::Validation(format!(
                "{}: rule '{}' sets both 'keyword' and 'regex'",
                scope, regex
            )))
        }
        (None, None) => {
            return Err(ConfigError::Validation(format!(
                "{}: every keyword entry needs either 'keyword' or 'regex'",
                scope
            )))
        }
        (Some(keyword), None) => {
            let text = keyword.to_string();
            let pattern = Pattern::keyword(&text, case_sensitive).map_err(|source| {
                ConfigError::RuleCompilation {
                    scope: scope.to_string(),
                    rule: text.clone(),
                    source,
                }
            })?;
            (RuleId::keyword(&text), pattern)
        }
        (None, Some(regex)) => {
            let pattern = Pattern::regex(&regex, case_sensitive).map_err(|source| {
                ConfigError::RuleCompilation {
                    scope: scope.to_string(),
                    rule: regex.clone(),
                    source,
                }
            })?;
            (RuleId::regex(&regex), pattern)
        }
    };

    let template = match (json_template, template) {
        (Some(text), _) => Some((TemplateKind::Json, text)),
        (None, Some(text)) if pattern.is_regex() => Some((TemplateKind::Regex, text)),
        (None, Some(_)) => {
            warn!(scope, rule = %id, "'template' only applies to regex rules, ignoring it");
            None
        }
        (None, None) => None,
    }
    .map(|(kind, text)| {
        MessageTemplate::parse(kind, &text).map_err(|source| ConfigError::RuleTemplate {
            scope: scope.to_string(),
            rule: pattern.source().to_string(),
            source,
        })
    })
    .transpose()?;

    let rule_scope = format!("{} rule '{}'", scope, pattern.source());
    validate_overrides(&overrides, &rule_scope)?;
    let excluded = match &overrides.excluded_keywords {
        Some(list) => compile_excluded(list, &rule_scope, case_sensitive)?,
        None => Vec::new(),
    };

    Ok(Rule {
        id,
        pattern,
        action,
        template,
        excluded,
        overrides,
    })
}

fn compile_excluded(
    entries: &[ExcludedEntry],
    scope: &str,
    case_sensitive: bool,
) -> Result<Vec<Pattern>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            let (text, is_regex) = match entry {
                ExcludedEntry::Plain(text) => (text.to_string(), false),
                ExcludedEntry::Detailed { keyword: Some(k), regex: None } => (k.to_string(), false),
                ExcludedEntry::Detailed { keyword: None, regex: Some(r) } => (r.clone(), true),
                ExcludedEntry::Detailed { .. } => {
                    return Err(ConfigError::Validation(format!(
                        "{}: each excluded keyword needs exactly one of 'keyword' or 'regex'",
                        scope
                    )))
                }
            };
            let compiled = if is_regex {
                Pattern::regex(&text, case_sensitive)
            } else {
                Pattern::keyword(&text, case_sensitive)
            };
            compiled.map_err(|source| ConfigError::RuleCompilation {
                scope: format!("{} excluded_keywords", scope),
                rule: text,
                source,
            })
        })
        .collect()
}

// ── Validation ──────────────────────────────────────────────────

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.attachment_lines == 0 {
        return Err(ConfigError::Validation("settings.attachment_lines must be > 0".to_string()));
    }
    if settings.multi_line_max_lines == 0 {
        return Err(ConfigError::Validation("settings.multi_line_max_lines must be > 0".to_string()));
    }
    if settings.multi_line_timeout_ms == 0 {
        return Err(ConfigError::Validation("settings.multi_line_timeout_ms must be > 0".to_string()));
    }
    Ok(())
}

fn validate_overrides(overrides: &Overrides, scope: &str) -> Result<(), ConfigError> {
    if overrides.attachment_lines == Some(0) {
        return Err(ConfigError::Validation(format!("{}: attachment_lines must be > 0", scope)));
    }
    Ok(())
}

fn validate_notifications(notifications: &NotificationsSection) -> Result<(), ConfigError> {
    if let Some(ntfy) = &notifications.ntfy {
        if blank(&ntfy.url) || blank(&ntfy.topic) {
            return Err(ConfigError::Validation(
                "notifications.ntfy requires both 'url' and 'topic'".to_string(),
            ));
        }
    }
    if let Some(apprise) = &notifications.apprise {
        if blank(&apprise.url) {
            return Err(ConfigError::Validation("notifications.apprise requires 'url'".to_string()));
        }
    }
    if let Some(webhook) = &notifications.webhook {
        if blank(&webhook.url) {
            return Err(ConfigError::Validation("notifications.webhook requires 'url'".to_string()));
        }
    }
    Ok(())
}

/// Checks that need the merged targets, so per-container and per-rule
/// overrides are covered too.
fn validate_channels(channels: &ChannelSet, scope: &str) -> Result<(), ConfigError> {
    if let Some(apprise) = &channels.apprise {
        if !apprise.is_deliverable() {
            return Err(ConfigError::Validation(format!(
                "{}: apprise url '{}' is not an http(s) Apprise API endpoint; set notifications.apprise.api_url to deliver it",
                scope,
                mask_apprise(&apprise.url)
            )));
        }
    }
    Ok(())
}

/// Apprise service URLs carry credentials; keep only the scheme.
fn mask_apprise(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, _)) => format!("{}://****", scheme),
        None => "****".to_string(),
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

// ── Resolution ──────────────────────────────────────────────────

/// First value set among `layers` (most specific first).
fn first<'a, T: ?Sized>(
    layers: &[&'a Overrides],
    get: impl Fn(&'a Overrides) -> Option<&'a T>,
) -> Option<&'a T> {
    layers.iter().find_map(|o| get(*o))
}

pub(crate) fn resolve(
    settings: &Settings,
    notifications: &NotificationsSection,
    layers: &[&Overrides],
) -> EffectiveSettings {
    let action_cooldown = first(layers, |o| o.action_cooldown.as_ref())
        .copied()
        .unwrap_or(settings.action_cooldown);

    EffectiveSettings {
        notification_cooldown: Duration::from_secs(
            first(layers, |o| o.notification_cooldown.as_ref())
                .copied()
                .unwrap_or(settings.notification_cooldown),
        ),
        action_cooldown: Duration::from_secs(action_cooldown).max(MIN_ACTION_COOLDOWN),
        attachment_lines: first(layers, |o| o.attachment_lines.as_ref())
            .copied()
            .unwrap_or(settings.attachment_lines),
        attach_logfile: first(layers, |o| o.attach_logfile.as_ref())
            .copied()
            .unwrap_or(settings.attach_logfile),
        notification_title: first(layers, |o| o.notification_title.as_deref())
            .unwrap_or(&settings.notification_title)
            .to_string(),
        hide_regex_in_title: first(layers, |o| o.hide_regex_in_title.as_ref())
            .copied()
            .unwrap_or(settings.hide_regex_in_title),
        channels: resolve_channels(notifications, layers),
    }
}

fn resolve_channels(notifications: &NotificationsSection, layers: &[&Overrides]) -> ChannelSet {
    let ntfy = notifications.ntfy.as_ref();
    let pick = |get: fn(&Overrides) -> Option<&String>, global: Option<&String>| -> Option<String> {
        first(layers, get)
            .or(global)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let ntfy_target = {
        let url = pick(|o| o.ntfy_url.as_ref(), ntfy.and_then(|n| n.url.as_ref()));
        let topic = pick(|o| o.ntfy_topic.as_ref(), ntfy.and_then(|n| n.topic.as_ref()));
        match (url, topic) {
            (Some(url), Some(topic)) => {
                let token = pick(|o| o.ntfy_token.as_ref(), ntfy.and_then(|n| n.token.as_ref()));
                let username = pick(|o| o.ntfy_username.as_ref(), ntfy.and_then(|n| n.username.as_ref()));
                let password = pick(|o| o.ntfy_password.as_ref(), ntfy.and_then(|n| n.password.as_ref()));
                let auth = match (token, username, password) {
                    (Some(token), _, _) => Some(NtfyAuth::Bearer(token)),
                    (None, Some(username), Some(password)) => Some(NtfyAuth::Basic { username, password }),
                    _ => None,
                };
                let priority = first(layers, |o| o.ntfy_priority.as_ref())
                    .or(ntfy.and_then(|n| n.priority.as_ref()))
                    .map(normalize_priority)
                    .unwrap_or_else(|| DEFAULT_NTFY_PRIORITY.to_string());
                Some(NtfyTarget {
                    url: url.trim_end_matches('/').to_string(),
                    topic,
                    tags: pick(|o| o.ntfy_tags.as_ref(), ntfy.and_then(|n| n.tags.as_ref()))
                        .unwrap_or_else(|| DEFAULT_NTFY_TAGS.to_string()),
                    priority,
                    auth,
                })
            }
            _ => None,
        }
    };

    let apprise_section = notifications.apprise.as_ref();
    let apprise = pick(|o| o.apprise_url.as_ref(), apprise_section.and_then(|a| a.url.as_ref())).map(|url| {
        AppriseTarget {
            url,
            api_url: apprise_section
                .and_then(|a| a.api_url.as_deref())
                .map(|u| u.trim_end_matches('/').to_string()),
        }
    });

    let webhook_section = notifications.webhook.as_ref();
    let webhook = pick(|o| o.webhook_url.as_ref(), webhook_section.and_then(|w| w.url.as_ref())).map(|url| {
        WebhookTarget {
            url,
            headers: first(layers, |o| o.webhook_headers.as_ref())
                .or(webhook_section.map(|w| &w.headers))
                .cloned()
                .unwrap_or_default(),
        }
    });

    ChannelSet {
        ntfy: ntfy_target,
        apprise,
        webhook,
    }
}

/// Accept `1`-`5` (number or numeric string) or a named ntfy priority.
/// Anything else is logged and replaced by the default.
pub fn normalize_priority(value: &PriorityValue) -> String {
    let (text, number) = match value {
        PriorityValue::Number(n) => (n.to_string(), Some(*n)),
        PriorityValue::Text(s) => {
            let trimmed = s.trim().to_lowercase();
            let number = trimmed.parse::<i64>().ok();
            (trimmed, number)
        }
    };

    match number {
        Some(n) if (1..=5).contains(&n) => n.to_string(),
        Some(n) => {
            warn!(priority = n, "ntfy priority must be between 1 and 5, using {}", DEFAULT_NTFY_PRIORITY);
            DEFAULT_NTFY_PRIORITY.to_string()
        }
        None if NTFY_PRIORITY_NAMES.contains(&text.as_str()) => text,
        None => {
            warn!(priority = %text, "Unknown ntfy priority, using {}", DEFAULT_NTFY_PRIORITY);
            DEFAULT_NTFY_PRIORITY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::load::parse_snapshot;

    fn compile_err(yaml: &str) -> ConfigError {
        parse_snapshot(yaml).expect_err("config should be rejected")
    }

    // ── Validation ──────────────────────────────────────────────

    #[test]
    fn test_invalid_regex_rejected_with_rule_named() {
        let err = compile_err("containers:\n  web:\n    keywords:\n      - regex: '(unclosed'\n");
        match err {
            ConfigError::RuleCompilation { scope, rule, .. } => {
                assert_eq!(scope, "container 'web'");
                assert_eq!(rule, "(unclosed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_global_regex_rejected() {
        let err = compile_err("containers: [web]\nglobal_keywords:\n  - regex: '[a-'\n");
        assert!(matches!(err, ConfigError::RuleCompilation { ref scope, .. } if scope == "global_keywords"));
    }

    #[test]
    fn test_no_containers_rejected() {
        assert!(matches!(compile_err("global_keywords: [error]\n"), ConfigError::Validation(_)));
    }

    #[test]
    fn test_no_keywords_rejected() {
        assert!(matches!(compile_err("containers: [web, db]\n"), ConfigError::Validation(_)));
    }

    #[test]
    fn test_both_keyword_and_regex_rejected() {
        let err = compile_err("containers:\n  web:\n    keywords:\n      - keyword: a\n        regex: b\n");
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("both")));
    }

    #[test]
    fn test_entry_without_mode_rejected() {
        let err = compile_err("containers:\n  web:\n    keywords:\n      - action: restart\n");
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_ntfy_without_topic_rejected() {
        let err = compile_err("containers: {web: [error]}\nnotifications:\n  ntfy:\n    url: http://ntfy\n");
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("ntfy")));
    }

    #[test]
    fn test_zero_attachment_lines_rejected() {
        let err = compile_err("containers:\n  web:\n    keywords: [error]\n    attachment_lines: 0\n");
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_apprise_service_url_without_api_rejected() {
        let err = compile_err("containers: {web: [error]}\nnotifications:\n  apprise:\n    url: 'discord://id/token'\n");
        match err {
            ConfigError::Validation(message) => {
                assert!(message.starts_with("notifications:"));
                assert!(message.contains("api_url"));
                assert!(!message.contains("id/token"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_container_apprise_override_without_api_rejected() {
        let yaml = r#"
containers:
  web:
    keywords: [error]
    apprise_url: 'discord://id/token'
notifications:
  apprise:
    url: 'http://apprise:8000/notify/key'
"#;
        let err = compile_err(yaml);
        assert!(matches!(err, ConfigError::Validation(ref m) if m.starts_with("container 'web'")));
    }

    #[test]
    fn test_apprise_service_url_with_api_accepted() {
        let yaml = r#"
containers:
  web:
    keywords: [error]
    apprise_url: 'discord://id/token'
notifications:
  apprise:
    url: 'http://apprise:8000/notify/key'
    api_url: 'http://apprise:8000/'
"#;
        let snapshot = parse_snapshot(yaml).unwrap();
        let apprise = snapshot.entity("web").unwrap().rules[0].settings.channels.apprise.clone().unwrap();
        assert_eq!(apprise.url, "discord://id/token");
        assert_eq!(apprise.api_url.as_deref(), Some("http://apprise:8000"));
    }

    #[test]
    fn test_malformed_template_rejected() {
        let err = compile_err("containers:\n  web:\n    keywords:\n      - regex: 'x'\n        template: '{oops'\n");
        assert!(matches!(err, ConfigError::RuleTemplate { .. }));
    }

    // ── Resolution ──────────────────────────────────────────────

    #[test]
    fn test_action_cooldown_floor() {
        let snapshot = parse_snapshot(
            "containers:\n  web:\n    keywords:\n      - keyword: oom\n        action: restart\n        action_cooldown: 10\n",
        )
        .unwrap();
        let web = snapshot.entity("web").unwrap();
        assert_eq!(web.rules[0].settings.action_cooldown, Duration::from_secs(60));
        assert_eq!(snapshot.defaults.action_cooldown, Duration::from_secs(300));
    }

    #[test]
    fn test_precedence_rule_over_container_over_settings() {
        let yaml = r#"
containers:
  web:
    notification_cooldown: 20
    attachment_lines: 50
    keywords:
      - keyword: error
        notification_cooldown: 2
      - timeout
settings:
  notification_cooldown: 9
  attach_logfile: true
"#;
        let snapshot = parse_snapshot(yaml).unwrap();
        let web = snapshot.entity("web").unwrap();
        let error = &web.rules[0].settings;
        let timeout = &web.rules[1].settings;

        assert_eq!(error.notification_cooldown, Duration::from_secs(2));
        assert_eq!(timeout.notification_cooldown, Duration::from_secs(20));
        assert_eq!(timeout.attachment_lines, 50);
        assert!(timeout.attach_logfile);
        assert_eq!(snapshot.defaults.notification_cooldown, Duration::from_secs(9));
    }

    #[test]
    fn test_global_rule_uses_container_overrides() {
        let yaml = r#"
containers:
  web:
    notification_cooldown: 42
global_keywords: [error]
"#;
        let snapshot = parse_snapshot(yaml).unwrap();
        let web = snapshot.entity("web").unwrap();
        assert_eq!(web.rules.len(), 1);
        assert_eq!(web.rules[0].settings.notification_cooldown, Duration::from_secs(42));
    }

    #[test]
    fn test_ntfy_resolution_and_auth() {
        let yaml = r#"
containers:
  web:
    ntfy_topic: web-alerts
    keywords:
      - keyword: panic
        ntfy_priority: 5
        ntfy_tags: rotating_light
      - error
notifications:
  ntfy:
    url: http://ntfy.local/
    topic: alerts
    username: admin
    password: secret
"#;
        let snapshot = parse_snapshot(yaml).unwrap();
        let web = snapshot.entity("web").unwrap();

        let panic = web.rules[0].settings.channels.ntfy.as_ref().unwrap();
        assert_eq!(panic.url, "http://ntfy.local");
        assert_eq!(panic.topic, "web-alerts");
        assert_eq!(panic.priority, "5");
        assert_eq!(panic.tags, "rotating_light");
        assert_eq!(
            panic.auth,
            Some(NtfyAuth::Basic {
                username: "admin".to_string(),
                password: "secret".to_string()
            })
        );

        let error = web.rules[1].settings.channels.ntfy.as_ref().unwrap();
        assert_eq!(error.priority, DEFAULT_NTFY_PRIORITY);
        assert_eq!(error.tags, DEFAULT_NTFY_TAGS);

        let defaults = snapshot.defaults.channels.ntfy.as_ref().unwrap();
        assert_eq!(defaults.topic, "alerts");
    }

    #[test]
    fn test_token_beats_basic_auth() {
        let yaml = "containers: {web: [error]}\nnotifications:\n  ntfy: {url: 'http://n', topic: t, token: tk, username: u, password: p}\n";
        let snapshot = parse_snapshot(yaml).unwrap();
        let ntfy = snapshot.defaults.channels.ntfy.as_ref().unwrap();
        assert_eq!(ntfy.auth, Some(NtfyAuth::Bearer("tk".to_string())));
    }

    #[test]
    fn test_container_webhook_override_without_global() {
        let yaml = r#"
containers:
  web:
    keywords: [error]
    webhook_url: http://hooks/web
    webhook_headers:
      Authorization: Bearer abc
"#;
        let snapshot = parse_snapshot(yaml).unwrap();
        let web = snapshot.entity("web").unwrap();
        let webhook = web.rules[0].settings.channels.webhook.as_ref().unwrap();
        assert_eq!(webhook.url, "http://hooks/web");
        assert_eq!(webhook.headers.len(), 1);
        assert!(snapshot.defaults.channels.webhook.is_none());
    }

    #[test]
    fn test_priority_normalization() {
        assert_eq!(normalize_priority(&PriorityValue::Number(4)), "4");
        assert_eq!(normalize_priority(&PriorityValue::Text("2".to_string())), "2");
        assert_eq!(normalize_priority(&PriorityValue::Text("Urgent".to_string())), "urgent");
        assert_eq!(normalize_priority(&PriorityValue::Number(9)), "3");
        assert_eq!(normalize_priority(&PriorityValue::Text("loud".to_string())), "3");
    }

    #[test]
    fn test_keywords_with_attachment_resolve_attach() {
        let yaml = "containers:\n  web:\n    keywords: [error]\n    keywords_with_attachment: [fatal]\n";
        let snapshot = parse_snapshot(yaml).unwrap();
        let web = snapshot.entity("web").unwrap();
        assert!(!web.rules[0].settings.attach_logfile);
        assert!(web.rules[1].settings.attach_logfile);
    }

    #[test]
    fn test_keyword_in_both_lists_keeps_attachment() {
        let yaml = "containers:\n  web:\n    keywords: [error, timeout]\n    keywords_with_attachment: [error]\n";
        let snapshot = parse_snapshot(yaml).unwrap();
        let web = snapshot.entity("web").unwrap();
        assert_eq!(web.rules.len(), 2);
        assert_eq!(web.rules[0].rule.id, RuleId::keyword("error"));
        assert!(web.rules[0].settings.attach_logfile);
        assert!(!web.rules[1].settings.attach_logfile);
    }

    #[test]
    fn test_explicit_attach_false_wins_over_later_duplicate() {
        let yaml = r#"
containers:
  web:
    keywords:
      - keyword: error
        attach_logfile: false
    keywords_with_attachment: [error]
    action_keywords:
      - restart: error
"#;
        let snapshot = parse_snapshot(yaml).unwrap();
        let web = snapshot.entity("web").unwrap();
        assert_eq!(web.rules.len(), 1);
        assert!(!web.rules[0].settings.attach_logfile);
        assert_eq!(web.rules[0].rule.action, Some(crate::action::ActionKind::Restart));
    }

    #[test]
    fn test_summary_masks_secrets() {
        let yaml = "containers: {web: [error]}\nnotifications:\n  ntfy: {url: 'http://n', topic: t, token: supersecret}\n  apprise: {url: 'tgram://bot/chat', api_url: 'http://apprise:8000'}\n";
        let summary = parse_snapshot(yaml).unwrap().summary();
        assert!(summary.contains("ntfy=http://n/t"));
        assert!(!summary.contains("supersecret"));
        assert!(!summary.contains("tgram"));
    }
}
