//! Apprise channel, delivered through an Apprise API server.
//!
//! Two shapes are supported:
//! - `api_url` set: stateless call to `{api_url}/notify/` carrying the
//!   configured Apprise URL(s) in the payload;
//! - `url` is itself an `http(s)` endpoint: stateful call posting straight to
//!   it (e.g. `http://apprise:8000/notify/<key>`).

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::debug;

use super::target::AppriseTarget;
use super::{check_response, truncate, Alert, ChannelSet, Notifier, NotifyError, NotifyFuture};

pub const APPRISE_MESSAGE_LIMIT: usize = 1900;

#[derive(Debug, Serialize)]
struct ApprisePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    urls: Option<&'a str>,
    title: &'a str,
    body: &'a str,
}

pub struct AppriseNotifier {
    client: reqwest::Client,
}

impl AppriseNotifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Endpoint to post to, plus the Apprise URL(s) to pass along when stateless.
    fn endpoint(target: &AppriseTarget) -> Result<(String, Option<&str>), NotifyError> {
        if let Some(api) = &target.api_url {
            return Ok((format!("{}/notify/", api), Some(target.url.as_str())));
        }
        if target.is_api_endpoint() {
            return Ok((target.url.clone(), None));
        }
        Err(NotifyError::InvalidConfig(
            "apprise url is not an http(s) endpoint and no api_url is set".to_string(),
        ))
    }

    fn request(&self, target: &AppriseTarget, alert: &Alert) -> Result<reqwest::RequestBuilder, NotifyError> {
        let (endpoint, urls) = Self::endpoint(target)?;
        let body = truncate(&alert.message, APPRISE_MESSAGE_LIMIT);

        let request = match &alert.attachment {
            None => self.client.post(endpoint).json(&ApprisePayload {
                urls,
                title: &alert.title,
                body: &body,
            }),
            Some(attachment) => {
                let part = Part::bytes(attachment.content.clone().into_bytes())
                    .file_name(attachment.file_name.clone())
                    .mime_str("text/plain")?;
                let mut form = Form::new()
                    .text("title", alert.title.clone())
                    .text("body", body);
                if let Some(urls) = urls {
                    form = form.text("urls", urls.to_string());
                }
                self.client.post(endpoint).multipart(form.part("attach", part))
            }
        };
        Ok(request)
    }
}

impl Notifier for AppriseNotifier {
    fn name(&self) -> &'static str {
        "apprise"
    }

    fn accepts(&self, channels: &ChannelSet) -> bool {
        channels.apprise.is_some()
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> NotifyFuture<'a> {
        Box::pin(async move {
            let target = alert
                .channels
                .apprise
                .as_ref()
                .ok_or_else(|| NotifyError::InvalidConfig("alert has no apprise target".to_string()))?;
            debug!(stateless = target.api_url.is_some(), "Sending apprise notification");
            let response = self.request(target, alert)?.send().await?;
            check_response("apprise", response).await
        })
    }
}
