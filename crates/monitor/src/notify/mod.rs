//! Notify module — alert delivery to ntfy, Apprise and generic webhooks.
//!
//! Each channel is a [`Notifier`]. The [`Dispatcher`] fans one [`Alert`] out
//! to every channel the alert targets; a failing channel never stops the
//! others.

pub mod apprise;
pub mod dispatch;
pub mod ntfy;
pub mod target;
pub mod title;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub use dispatch::{DispatchReport, Dispatcher};
pub use target::{AppriseTarget, ChannelSet, NtfyAuth, NtfyTarget, WebhookTarget};

/// Per-request timeout for every channel.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SHORTENED_PREFIX: &str = "This message had to be shortened: \n";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid notification configuration: {0}")]
    InvalidConfig(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Log lines attached to an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content: String,
}

impl Attachment {
    pub fn log_tail(entity: &str, lines: usize, content: String) -> Self {
        Self {
            file_name: format!("last_{}_lines_from_{}.log", lines, entity),
            content,
        }
    }
}

/// One notification, fully rendered, with the channels it goes to.
#[derive(Debug, Clone)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub container: Option<String>,
    pub keywords: Vec<String>,
    pub attachment: Option<Attachment>,
    pub channels: ChannelSet,
    /// Docker host the alert is about, when several are monitored.
    pub host: Option<String>,
}

impl Alert {
    /// A message without a container or keywords (start, shutdown, reload).
    pub fn lifecycle(title: impl Into<String>, message: impl Into<String>, channels: ChannelSet) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            container: None,
            keywords: Vec::new(),
            attachment: None,
            channels,
            host: None,
        }
    }

    /// Attribute the alert to `host`: the title gets a `[host] - ` prefix.
    pub fn on_host(mut self, host: Option<&str>) -> Self {
        if let Some(host) = host {
            self.title = format!("[{}] - {}", host, self.title);
            self.host = Some(host.to_string());
        }
        self
    }
}

pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// A delivery channel.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `channels` contains a target for this notifier.
    fn accepts(&self, channels: &ChannelSet) -> bool;

    fn send<'a>(&'a self, alert: &'a Alert) -> NotifyFuture<'a>;
}

pub(crate) fn http_client() -> Result<reqwest::Client, NotifyError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(NotifyError::from)
}

/// Cut `message` to `limit` characters, flagging it when shortened.
pub(crate) fn truncate(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", SHORTENED_PREFIX, &message[..cut]),
        None => message.to_string(),
    }
}

/// Map a non-success response to an error, keeping the body for the log.
pub(crate) async fn check_response(
    channel: &str,
    response: reqwest::Response,
) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(NotifyError::RateLimited(format!("{} rate limit exceeded", channel)));
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read response body".to_string());
    Err(NotifyError::SendFailed(format!("{} returned {}: {}", channel, status, body)))
}
