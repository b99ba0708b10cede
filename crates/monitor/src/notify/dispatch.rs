//! Dispatcher — concurrent fan-out of one alert to its channels.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error, info};

use super::apprise::AppriseNotifier;
use super::ntfy::NtfyNotifier;
use super::webhook::WebhookNotifier;
use super::{http_client, Alert, Notifier, NotifyError};

/// Outcome of one dispatch, per channel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// ntfy, Apprise and webhook over one shared HTTP client.
    pub fn http() -> Result<Self, NotifyError> {
        let client = http_client()?;
        Ok(Self::new(vec![
            Arc::new(NtfyNotifier::new(client.clone())),
            Arc::new(AppriseNotifier::new(client.clone())),
            Arc::new(WebhookNotifier::new(client)),
        ]))
    }

    /// Send `alert` to every targeted channel at once. Failures are logged
    /// and reported; they never affect the other channels.
    pub async fn dispatch(&self, alert: &Alert) -> DispatchReport {
        let targeted: Vec<&Arc<dyn Notifier>> = self
            .notifiers
            .iter()
            .filter(|n| n.accepts(&alert.channels))
            .collect();

        if targeted.is_empty() {
            debug!(title = %alert.title, "No notification channel configured, alert not sent");
            return DispatchReport::default();
        }

        let results = join_all(
            targeted
                .iter()
                .map(|notifier| async move { (notifier.name(), notifier.send(alert).await) }),
        )
        .await;

        let mut report = DispatchReport::default();
        for (channel, result) in results {
            match result {
                Ok(()) => {
                    info!(channel, title = %alert.title, "Notification sent");
                    report.delivered.push(channel);
                }
                Err(e) => {
                    error!(channel, title = %alert.title, error = %e, "Failed to send notification");
                    report.failed.push((channel, e.to_string()));
                }
            }
        }
        report
    }
}
