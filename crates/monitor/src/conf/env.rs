//! Environment overrides — applied on top of the YAML file.
//!
//! Variables win over the file; the file wins over built-in defaults.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use super::model::{
    ContainerField, ContainersField, FileConfig, KeywordEntry, KeywordsField, PriorityValue,
    ScalarText,
};
use super::ConfigError;

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Where environment values come from: the process, or a fixed map in tests.
#[derive(Clone)]
pub struct EnvSource {
    lookup: Arc<Lookup>,
}

impl EnvSource {
    pub fn from_process() -> Self {
        Self {
            lookup: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            lookup: Arc::new(move |key| map.get(key).cloned()),
        }
    }

    pub fn empty() -> Self {
        Self::from_pairs([])
    }

    /// Non-blank value of `key`, trimmed.
    pub fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Env { var: key.to_string(), value }),
        }
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::Env { var: key.to_string(), value }),
            },
        }
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EnvSource")
    }
}

pub fn apply(config: &mut FileConfig, env: &EnvSource) -> Result<(), ConfigError> {
    apply_containers(config, env);
    apply_keywords(config, env);
    apply_notifications(config, env);
    apply_settings(config, env)
}

fn apply_containers(config: &mut FileConfig, env: &EnvSource) {
    let names = env.list("CONTAINERS");
    if names.is_empty() {
        return;
    }
    let mut sections = config.containers.take().unwrap_or_default().into_sections();
    for name in names {
        sections.entry(name).or_default();
    }
    config.containers = Some(ContainersField::Map(
        sections
            .into_iter()
            .map(|(name, section)| (name, Some(ContainerField::Section(section))))
            .collect(),
    ));
}

fn apply_keywords(config: &mut FileConfig, env: &EnvSource) {
    let plain = env.list("GLOBAL_KEYWORDS");
    let attached = env.list("GLOBAL_KEYWORDS_WITH_ATTACHMENT");
    if plain.is_empty() && attached.is_empty() {
        return;
    }
    let mut section = config
        .global_keywords
        .take()
        .map(KeywordsField::into_section)
        .unwrap_or_default();
    let entry = |text: String| KeywordEntry::Plain(ScalarText::Text(text));
    section.keywords.extend(plain.into_iter().map(entry));
    section.keywords_with_attachment.extend(attached.into_iter().map(entry));
    config.global_keywords = Some(KeywordsField::Section(section));
}

fn apply_notifications(config: &mut FileConfig, env: &EnvSource) {
    let notifications = &mut config.notifications;

    let ntfy_vars = [
        "NTFY_URL",
        "NTFY_TOPIC",
        "NTFY_TOKEN",
        "NTFY_USERNAME",
        "NTFY_PASSWORD",
        "NTFY_PRIORITY",
        "NTFY_TAGS",
    ];
    if ntfy_vars.iter().any(|var| env.get(var).is_some()) {
        let ntfy = notifications.ntfy.get_or_insert_with(Default::default);
        set(&mut ntfy.url, env.get("NTFY_URL"));
        set(&mut ntfy.topic, env.get("NTFY_TOPIC"));
        set(&mut ntfy.token, env.get("NTFY_TOKEN"));
        set(&mut ntfy.username, env.get("NTFY_USERNAME"));
        set(&mut ntfy.password, env.get("NTFY_PASSWORD"));
        set(&mut ntfy.tags, env.get("NTFY_TAGS"));
        set(&mut ntfy.priority, env.get("NTFY_PRIORITY").map(PriorityValue::Text));
    }

    if let Some(url) = env.get("APPRISE_URL") {
        notifications.apprise.get_or_insert_with(Default::default).url = Some(url);
    }
    if let Some(url) = env.get("WEBHOOK_URL") {
        notifications.webhook.get_or_insert_with(Default::default).url = Some(url);
    }
}

fn apply_settings(config: &mut FileConfig, env: &EnvSource) -> Result<(), ConfigError> {
    let settings = &mut config.settings;

    if let Some(level) = env.get("LOG_LEVEL") {
        settings.log_level = level;
    }
    if let Some(title) = env.get("NOTIFICATION_TITLE") {
        settings.notification_title = title;
    }
    if let Some(socket) = env.get("DOCKER_SOCKET") {
        settings.docker_socket = socket;
    }
    if let Some(hosts) = env.get("DOCKER_HOST") {
        settings.docker_host = hosts;
    }
    set_value(&mut settings.notification_cooldown, env.parse("NOTIFICATION_COOLDOWN")?);
    set_value(&mut settings.action_cooldown, env.parse("ACTION_COOLDOWN")?);
    set_value(&mut settings.attachment_lines, env.parse("ATTACHMENT_LINES")?);
    set_value(&mut settings.multi_line_entries, env.flag("MULTI_LINE_ENTRIES")?);
    set_value(&mut settings.reload_config, env.flag("RELOAD_CONFIG")?);
    set_value(&mut settings.attach_logfile, env.flag("ATTACH_LOGFILE")?);
    set_value(&mut settings.disable_start_message, env.flag("DISABLE_START_MESSAGE")?);
    set_value(&mut settings.disable_shutdown_message, env.flag("DISABLE_SHUTDOWN_MESSAGE")?);
    set_value(
        &mut settings.disable_config_reload_message,
        env.flag("DISABLE_CONFIG_RELOAD_MESSAGE")?,
    );
    set_value(
        &mut settings.disable_container_event_message,
        env.flag("DISABLE_CONTAINER_EVENT_MESSAGE")?,
    );
    Ok(())
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn set_value<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
