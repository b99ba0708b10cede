//! Serve — start the watchers and container tasks, run until a signal.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, Instrument};

use super::stop::{shutdown, shutdown_signal, SHUTDOWN_GRACE};
use crate::service::{lifecycle, reconcile, watch_config, watch_events};
use crate::state::SharedState;

/// Run every host until a signal. Hosts share one config watcher and one
/// shutdown.
pub async fn serve(hosts: Vec<SharedState>) -> anyhow::Result<()> {
    let mut monitored = 0;
    for state in &hosts {
        // Events first, so a container starting during the initial pass is not missed.
        state
            .tracker
            .spawn(watch_events(Arc::clone(state)).instrument(state.span()));

        let report = reconcile(state).await.with_context(|| match state.host() {
            Some(host) => format!("Failed to list running containers on {}", host),
            None => "Failed to list running containers".to_string(),
        })?;
        monitored += report.monitored.len();
        lifecycle::announce_start(state, &report);
    }

    if let Some(first) = hosts.first() {
        first.tracker.spawn(watch_config(hosts.clone()));
    }

    info!("");
    info!("========================================");
    info!("Log monitor is ready!");
    info!("Monitoring: {} container(s) on {} host(s)", monitored, hosts.len());
    info!("Press Ctrl+C to shutdown gracefully");
    info!("========================================");
    info!("");

    shutdown_signal().await;
    shutdown(&hosts, SHUTDOWN_GRACE).await;
    Ok(())
}
