//! Lifecycle messages — start, container start, reload and shutdown.
//!
//! Each one is logged unconditionally and sent to the default channels
//! unless its `disable_*` setting is on. Start, container and reload
//! messages name their host when several are monitored; shutdown is one
//! message for the whole process.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, Instrument};

use super::supervisor::ReconcileReport;
use crate::metrics::MonitorMetrics;
use crate::notify::Alert;
use crate::state::SharedState;

pub const APP_TITLE: &str = "Log Monitor";

fn bullet_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\n - {}", n))
        .collect::<String>()
}

/// Body of the start and reload messages.
pub fn monitoring_overview(report: &ReconcileReport) -> String {
    let mut text = format!(
        "These containers are being monitored:{}",
        bullet_list(&report.monitored)
    );
    if !report.not_running.is_empty() {
        text.push_str(&format!(
            "\n\nThese selected containers are not running:{}",
            bullet_list(&report.not_running)
        ));
    }
    text
}

pub fn announce_start(state: &SharedState, report: &ReconcileReport) -> Option<JoinHandle<()>> {
    let overview = monitoring_overview(report);
    info!(host = state.host().unwrap_or_default(), "{}", overview);
    if state.snapshot().settings.disable_start_message {
        return None;
    }
    Some(spawn_send(
        state,
        format!("The program is running. {}", overview),
    ))
}

pub fn announce_container(state: &SharedState, name: &str) -> Option<JoinHandle<()>> {
    info!(container = %name, host = state.host().unwrap_or_default(), "Monitoring new container");
    if state.snapshot().settings.disable_container_event_message {
        return None;
    }
    Some(spawn_send(state, format!("Monitoring new container: {}", name)))
}

pub fn announce_reload(state: &SharedState, report: &ReconcileReport) -> Option<JoinHandle<()>> {
    let overview = monitoring_overview(report);
    info!(
        host = state.host().unwrap_or_default(),
        started = report.started.len(),
        stopped = report.stopped.len(),
        "Configuration reloaded"
    );
    if state.snapshot().settings.disable_config_reload_message {
        return None;
    }
    Some(spawn_send(
        state,
        format!("The configuration was reloaded. {}", overview),
    ))
}

/// Sent inline: the tracker is already closed when this runs.
pub async fn announce_shutdown(state: &SharedState) {
    let summary = state.metrics.snapshot();
    info!(%summary, "Shutting down");
    if state.snapshot().settings.disable_shutdown_message {
        return;
    }
    send(state, "Shutting down".to_string(), None).await;
}

fn spawn_send(state: &SharedState, message: String) -> JoinHandle<()> {
    let state = Arc::clone(state);
    let tracker = state.tracker.clone();
    let span = state.span();
    tracker.spawn(async move { send(&state, message, state.host()).await }.instrument(span))
}

async fn send(state: &SharedState, message: String, host: Option<&str>) {
    let channels = state.snapshot().defaults.channels.clone();
    let alert = Alert::lifecycle(APP_TITLE, message, channels).on_host(host);
    let report = state.dispatcher.dispatch(&alert).await;
    MonitorMetrics::add(&state.metrics.deliveries, report.delivered.len() as u64);
    MonitorMetrics::add(&state.metrics.delivery_failures, report.failed.len() as u64);
}
