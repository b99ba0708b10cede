//! ntfy channel.
//!
//! Title, tags and priority travel as query parameters so non-ASCII titles
//! survive. With an attachment the log tail is the request body and the
//! message rides along in the query when it is short enough.

use tracing::debug;

use super::{check_response, truncate, Alert, ChannelSet, Notifier, NotifyError, NotifyFuture};
use super::target::{NtfyAuth, NtfyTarget};

pub const NTFY_MESSAGE_LIMIT: usize = 3900;
/// Longest message still sent in the query next to an attachment.
const INLINE_MESSAGE_LIMIT: usize = 199;

pub struct NtfyNotifier {
    client: reqwest::Client,
}

impl NtfyNotifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn request(&self, target: &NtfyTarget, alert: &Alert) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", target.url, target.topic);
        let message = truncate(&alert.message, NTFY_MESSAGE_LIMIT);

        let mut query = vec![
            ("title", alert.title.clone()),
            ("tags", target.tags.clone()),
            ("priority", target.priority.clone()),
        ];
        let body = match &alert.attachment {
            Some(attachment) => {
                query.push(("filename", attachment.file_name.clone()));
                if message.chars().count() < INLINE_MESSAGE_LIMIT {
                    query.push(("message", message));
                }
                attachment.content.clone()
            }
            None => message,
        };

        let request = self.client.post(url).query(&query).body(body);
        match &target.auth {
            Some(NtfyAuth::Bearer(token)) => request.bearer_auth(token),
            Some(NtfyAuth::Basic { username, password }) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }
}

impl Notifier for NtfyNotifier {
    fn name(&self) -> &'static str {
        "ntfy"
    }

    fn accepts(&self, channels: &ChannelSet) -> bool {
        channels.ntfy.is_some()
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> NotifyFuture<'a> {
        Box::pin(async move {
            let target = alert
                .channels
                .ntfy
                .as_ref()
                .ok_or_else(|| NotifyError::InvalidConfig("alert has no ntfy target".to_string()))?;
            debug!(url = %target.url, topic = %target.topic, "Sending ntfy notification");
            let response = self.request(target, alert).send().await?;
            check_response("ntfy", response).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::CaptureServer;
    use crate::notify::{http_client, Attachment};
    use axum::http::StatusCode;

    fn alert(server: &CaptureServer, auth: Option<NtfyAuth>) -> Alert {
        Alert {
            title: "'error' found in web".to_string(),
            message: "ERROR: disk full".to_string(),
            container: Some("web".to_string()),
            keywords: vec!["error".to_string()],
            attachment: None,
            channels: ChannelSet {
                ntfy: Some(NtfyTarget {
                    url: server.url.clone(),
                    topic: "alerts".to_string(),
                    tags: "kite,mag".to_string(),
                    priority: "4".to_string(),
                    auth,
                }),
                ..Default::default()
            },
            host: None,
        }
    }

    #[tokio::test]
    async fn test_send_plain_message() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let notifier = NtfyNotifier::new(http_client().unwrap());
        notifier.send(&alert(&server, None)).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.path, "/alerts");
        assert_eq!(req.body_text(), "ERROR: disk full");
        assert_eq!(req.query_value("title").as_deref(), Some("'error' found in web"));
        assert_eq!(req.query_value("priority").as_deref(), Some("4"));
        assert_eq!(req.query_value("tags").as_deref(), Some("kite,mag"));
        assert!(req.header("authorization").is_none());
    }

    #[tokio::test]
    async fn test_bearer_auth() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let notifier = NtfyNotifier::new(http_client().unwrap());
        let alert = alert(&server, Some(NtfyAuth::Bearer("tk_123".to_string())));
        notifier.send(&alert).await.unwrap();
        assert_eq!(server.requests()[0].header("authorization"), Some("Bearer tk_123"));
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let notifier = NtfyNotifier::new(http_client().unwrap());
        let auth = NtfyAuth::Basic {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        notifier.send(&alert(&server, Some(auth))).await.unwrap();
        // base64("user:pass")
        assert_eq!(server.requests()[0].header("authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[tokio::test]
    async fn test_attachment_is_body() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let notifier = NtfyNotifier::new(http_client().unwrap());
        let mut alert = alert(&server, None);
        alert.attachment = Some(Attachment::log_tail("web", 2, "line 1\nline 2\n".to_string()));
        notifier.send(&alert).await.unwrap();

        let req = &server.requests()[0];
        assert_eq!(req.body_text(), "line 1\nline 2\n");
        assert_eq!(req.query_value("filename").as_deref(), Some("last_2_lines_from_web.log"));
        assert_eq!(req.query_value("message").as_deref(), Some("ERROR: disk full"));
    }

    #[tokio::test]
    async fn test_long_message_dropped_next_to_attachment() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let notifier = NtfyNotifier::new(http_client().unwrap());
        let mut alert = alert(&server, None);
        alert.message = "x".repeat(500);
        alert.attachment = Some(Attachment::log_tail("web", 1, "tail".to_string()));
        notifier.send(&alert).await.unwrap();
        assert!(server.requests()[0].query_value("message").is_none());
    }

    #[tokio::test]
    async fn test_message_truncated() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let notifier = NtfyNotifier::new(http_client().unwrap());
        let mut alert = alert(&server, None);
        alert.message = "y".repeat(NTFY_MESSAGE_LIMIT + 100);
        notifier.send(&alert).await.unwrap();

        let body = server.requests()[0].body_text();
        assert!(body.starts_with("This message had to be shortened"));
        assert_eq!(body.matches('y').count(), NTFY_MESSAGE_LIMIT);
    }

    #[tokio::test]
    async fn test_server_error_surfaces() {
        let server = CaptureServer::start(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = NtfyNotifier::new(http_client().unwrap());
        let err = notifier.send(&alert(&server, None)).await.unwrap_err();
        assert!(matches!(err, NotifyError::SendFailed(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces() {
        let server = CaptureServer::start(StatusCode::TOO_MANY_REQUESTS).await;
        let notifier = NtfyNotifier::new(http_client().unwrap());
        let err = notifier.send(&alert(&server, None)).await.unwrap_err();
        assert!(matches!(err, NotifyError::RateLimited(_)));
    }
}
