//! Stop — signal handling and graceful shutdown.

use std::time::Duration;

use tokio::time;
use tracing::{error, info, warn};

use crate::service::lifecycle;
use crate::state::SharedState;

/// How long running tasks get to finish after cancellation.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Cancel every task, give them `grace` to finish, then send the shutdown
/// message.
///
/// Hosts share the token and the tracker, so the first one stands in for
/// all of them.
pub async fn shutdown(hosts: &[SharedState], grace: Duration) {
    let Some(state) = hosts.first() else {
        return;
    };
    state.shutdown.cancel();
    state.tracker.close();
    if time::timeout(grace, state.tracker.wait()).await.is_err() {
        warn!(
            remaining = state.tracker.len(),
            "Tasks still running after {}s, shutting down anyway",
            grace.as_secs()
        );
    }
    lifecycle::announce_shutdown(state).await;
    info!("Shutdown complete");
}
