//! Generic webhook channel: a JSON POST with optional custom headers.

use serde::Serialize;
use tracing::debug;

use super::{check_response, Alert, ChannelSet, Notifier, NotifyError, NotifyFuture};

/// The JSON payload sent to webhook endpoints.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub container: Option<&'a str>,
    pub keywords: &'a [String],
    pub title: &'a str,
    pub message: &'a str,
    /// Null unless several Docker hosts are monitored.
    pub host: Option<&'a str>,
}

impl<'a> WebhookPayload<'a> {
    pub fn from_alert(alert: &'a Alert) -> Self {
        Self {
            container: alert.container.as_deref(),
            keywords: &alert.keywords,
            title: &alert.title,
            message: &alert.message,
            host: alert.host.as_deref(),
        }
    }
}

pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn accepts(&self, channels: &ChannelSet) -> bool {
        channels.webhook.is_some()
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> NotifyFuture<'a> {
        Box::pin(async move {
            let target = alert
                .channels
                .webhook
                .as_ref()
                .ok_or_else(|| NotifyError::InvalidConfig("alert has no webhook target".to_string()))?;
            debug!(url = %target.url, "Sending webhook");

            let mut request = self
                .client
                .post(&target.url)
                .json(&WebhookPayload::from_alert(alert));
            for (key, value) in &target.headers {
                request = request.header(key.as_str(), value.as_str());
            }
            let response = request.send().await?;
            check_response("webhook", response).await
        })
    }
}
