//! Resolved delivery targets — one per channel, after precedence merging.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NtfyAuth {
    Bearer(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtfyTarget {
    pub url: String,
    pub topic: String,
    pub tags: String,
    /// `1`-`5` or one of ntfy's named priorities.
    pub priority: String,
    pub auth: Option<NtfyAuth>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppriseTarget {
    pub url: String,
    pub api_url: Option<String>,
}

impl AppriseTarget {
    /// Whether `url` is itself an http(s) Apprise API endpoint.
    pub fn is_api_endpoint(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// A service URL such as `discord://...` can only be delivered through
    /// an Apprise API server given in `api_url`.
    pub fn is_deliverable(&self) -> bool {
        self.api_url.is_some() || self.is_api_endpoint()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

/// The channels a notification goes to. An absent target means the channel
/// is not configured at any level for this rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSet {
    pub ntfy: Option<NtfyTarget>,
    pub apprise: Option<AppriseTarget>,
    pub webhook: Option<WebhookTarget>,
}

impl ChannelSet {
    pub fn is_empty(&self) -> bool {
        self.ntfy.is_none() && self.apprise.is_none() && self.webhook.is_none()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.ntfy.is_some() {
            names.push("ntfy");
        }
        if self.apprise.is_some() {
            names.push("apprise");
        }
        if self.webhook.is_some() {
            names.push("webhook");
        }
        names
    }
}
