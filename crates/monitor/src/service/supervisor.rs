//! Supervisor — which containers have a monitor task.
//!
//! Tasks are started for configured containers that are running, stopped
//! when the container stops or leaves the config, and revived by the next
//! start event after they gave up.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn, Instrument};

use super::lifecycle;
use super::monitor::{self, reconnect_delay, ErrorWindow, StopReason, ERROR_WINDOW, MAX_STREAM_ERRORS};
use crate::docker::client::DockerError;
use crate::docker::event::ContainerEvent;
use crate::state::SharedState;

const DOCKER_TIMEOUT: Duration = Duration::from_secs(10);

/// What a reconcile pass found and changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Configured and running, monitored after this pass.
    pub monitored: Vec<String>,
    /// Configured but not running.
    pub not_running: Vec<String>,
    /// Tasks started by this pass.
    pub started: Vec<String>,
    /// Tasks stopped because the container left the config.
    pub stopped: Vec<String>,
}

/// Spawn the monitor task for `name`. Returns false when one is already
/// running or the process is shutting down.
pub fn start_monitoring(state: &SharedState, name: &str) -> bool {
    let Some(slot) = state.claim(name) else {
        return false;
    };
    let task_state = Arc::clone(state);
    let name = name.to_string();
    let span = state.span();
    let task = async move {
        task_state.metrics.task_started();
        info!(container = %name, "Monitoring container");
        let reason = monitor::run(&task_state, &name, &slot.token).await;
        task_state.release(&name, slot.generation);
        task_state.metrics.task_ended();
        match reason {
            StopReason::Cancelled => debug!(container = %name, "Monitoring cancelled"),
            StopReason::TooManyErrors => {
                error!(container = %name, %reason, "Monitoring stopped, waiting for the next start event")
            }
            _ => info!(container = %name, %reason, "Monitoring stopped"),
        }
    };
    state.tracker.spawn(task.instrument(span));
    true
}

pub fn stop_monitoring(state: &SharedState, name: &str) -> bool {
    state.cancel(name)
}

/// Bring the task set in line with the active snapshot and the running
/// containers.
pub async fn reconcile(state: &SharedState) -> Result<ReconcileReport, DockerError> {
    let snapshot = state.snapshot();
    let running: HashSet<String> = time::timeout(DOCKER_TIMEOUT, state.runtime.list_running())
        .await
        .map_err(|_| DockerError::ConnectionFailed("listing containers timed out".to_string()))??
        .into_iter()
        .filter(|c| c.running)
        .map(|c| c.name)
        .collect();

    let mut report = ReconcileReport::default();

    for name in state.monitored() {
        if snapshot.entity(&name).is_none() {
            stop_monitoring(state, &name);
            state.cooldowns.forget_container(&name);
            info!(container = %name, "Container removed from config, monitoring stopped");
            report.stopped.push(name);
        }
    }

    for name in snapshot.entity_names() {
        if running.contains(name) {
            if start_monitoring(state, name) {
                report.started.push(name.to_string());
            }
            report.monitored.push(name.to_string());
        } else {
            report.not_running.push(name.to_string());
        }
    }

    Ok(report)
}

/// React to one lifecycle event from the daemon.
pub fn on_event(state: &SharedState, event: &ContainerEvent) {
    match event {
        ContainerEvent::Started { name, .. } => {
            if state.snapshot().entity(name).is_none() {
                return;
            }
            if start_monitoring(state, name) {
                lifecycle::announce_container(state, name);
            }
        }
        ContainerEvent::Stopped { name, .. } => {
            if stop_monitoring(state, name) {
                info!(container = %name, "Container stopped");
            }
        }
    }
}

/// Follow daemon events until shutdown, reconnecting on failure.
pub async fn watch_events(state: SharedState) {
    let token = state.shutdown.clone();
    let mut errors = ErrorWindow::new(MAX_STREAM_ERRORS, ERROR_WINDOW);
    info!("Watching container events");

    loop {
        let mut events = state.runtime.events();
        let failure = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Event watcher stopped");
                    return;
                }
                next = events.next() => match next {
                    Some(Ok(event)) => on_event(&state, &event),
                    Some(Err(e)) => break Some(e),
                    None => break None,
                }
            }
        };

        match failure {
            Some(e) => warn!(error = %e, "Container event stream failed"),
            None => warn!("Container event stream ended"),
        }
        let attempt = errors.record(Instant::now());
        if errors.exceeded() {
            error!(errors = attempt, "Too many event stream errors, no longer watching container events");
            return;
        }
        tokio::select! {
            _ = token.cancelled() => return,
            _ = time::sleep(reconnect_delay(attempt)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FakeRuntime;
    use crate::conf::env::EnvSource;
    use crate::conf::load::parse_snapshot;
    use crate::conf::ConfigLoader;
    use crate::notify::testing::RecordingNotifier;
    use crate::notify::Dispatcher;
    use crate::state::MonitorState;

    const CONFIG: &str = "containers:\n  web: [error]\n  db: [error]\n  cache: [error]\n";

    fn setup(yaml: &str) -> (SharedState, Arc<FakeRuntime>, Arc<RecordingNotifier>) {
        let runtime = Arc::new(FakeRuntime::new());
        let recorder = RecordingNotifier::new();
        let state = Arc::new(MonitorState::new(
            parse_snapshot(yaml).unwrap(),
            ConfigLoader::with_path("/nonexistent/config.yaml", EnvSource::empty()),
            runtime.clone(),
            Dispatcher::new(vec![recorder.clone()]),
        ));
        (state, runtime, recorder)
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    // ── Reconcile ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_reconcile_starts_running_configured() {
        let (state, runtime, _) = setup(CONFIG);
        runtime.add_running("web");
        runtime.add_running("db");
        runtime.add_running("unrelated");

        let report = reconcile(&state).await.unwrap();
        assert_eq!(report.monitored, vec!["db", "web"]);
        assert_eq!(report.not_running, vec!["cache"]);
        assert_eq!(report.started.len(), 2);
        assert!(!state.is_monitoring("unrelated"));

        let again = reconcile(&state).await.unwrap();
        assert!(again.started.is_empty());
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_reconcile_stops_removed_containers() {
        let (state, runtime, _) = setup(CONFIG);
        runtime.add_running("web");
        runtime.add_running("db");
        reconcile(&state).await.unwrap();

        state.swap(parse_snapshot("containers:\n  web: [error]\n").unwrap());
        let report = reconcile(&state).await.unwrap();
        assert_eq!(report.stopped, vec!["db"]);
        assert!(state.is_monitoring("web"));
        assert!(!state.is_monitoring("db"));
        state.shutdown.cancel();
    }

    // ── Events ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_start_event_begins_monitoring_and_announces() {
        let (state, runtime, recorder) = setup(CONFIG);
        runtime.add_running("web");

        on_event(&state, &ContainerEvent::Started { id: "1".into(), name: "web".into() });
        assert!(state.is_monitoring("web"));
        wait_until(|| recorder.alerts().len() == 1).await;
        assert_eq!(recorder.alerts()[0].message, "Monitoring new container: web");

        on_event(&state, &ContainerEvent::Stopped { id: "1".into(), name: "web".into() });
        assert!(!state.is_monitoring("web"));
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unconfigured_start_event_ignored() {
        let (state, runtime, recorder) = setup(CONFIG);
        runtime.add_running("other");
        on_event(&state, &ContainerEvent::Started { id: "2".into(), name: "other".into() });
        assert!(!state.is_monitoring("other"));
        assert!(recorder.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_event_watcher_follows_fake_events() {
        let (state, runtime, _) = setup(CONFIG);
        runtime.add_running("db");
        let watcher = tokio::spawn(watch_events(Arc::clone(&state)));

        // The subscription is created when the watcher first polls.
        wait_until(|| {
            runtime.emit(ContainerEvent::Started { id: "3".into(), name: "db".into() });
            state.is_monitoring("db")
        })
        .await;

        state.shutdown.cancel();
        watcher.await.unwrap();
    }
}
