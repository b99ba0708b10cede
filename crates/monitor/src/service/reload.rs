//! Config reload — watches the config file and swaps in a new snapshot.
//!
//! The file is polled for a content fingerprint; a change is applied once
//! the file has been quiet for the debounce period. A config that fails to
//! load or validate leaves the running snapshot in place.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use super::supervisor::{self, ReconcileReport};
use super::lifecycle;
use crate::conf::ConfigError;
use crate::docker::client::DockerError;
use crate::metrics::MonitorMetrics;
use crate::state::SharedState;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration applied but containers could not be listed: {0}")]
    Docker(#[from] DockerError),
}

/// Identity of the file contents at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
    digest: u64,
}

/// `None` when the file is missing or unreadable.
pub fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let meta = std::fs::metadata(path).ok()?;
    let contents = std::fs::read(path).ok()?;
    let mut hasher = DefaultHasher::new();
    contents.hash(&mut hasher);
    Some(Fingerprint {
        modified: meta.modified().ok(),
        len: meta.len(),
        digest: hasher.finish(),
    })
}

/// Load the config again and make it active on every host.
///
/// The snapshot is shared, so it is swapped once; each host then reconciles
/// its own containers. A host whose daemon cannot be listed does not stop
/// the others, the first such error is returned once all have been tried.
pub async fn apply_reload(hosts: &[SharedState]) -> Result<Vec<ReconcileReport>, ReloadError> {
    let Some(first) = hosts.first() else {
        return Ok(Vec::new());
    };
    let snapshot = match first.loader.load() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            MonitorMetrics::incr(&first.metrics.reload_failures);
            error!(error = %e, "Error reloading config, keeping the previous configuration");
            return Err(e.into());
        }
    };

    info!(config = %snapshot.summary(), "New configuration loaded");
    let level = snapshot.settings.log_level.clone();
    first.swap(snapshot);
    MonitorMetrics::incr(&first.metrics.reloads);
    first.log_control.apply(&level);

    let mut reports = Vec::with_capacity(hosts.len());
    let mut failure = None;
    for state in hosts {
        match supervisor::reconcile(state).await {
            Ok(report) => {
                lifecycle::announce_reload(state, &report);
                reports.push(report);
            }
            Err(e) => {
                error!(host = state.host().unwrap_or_default(), error = %e, "Could not reconcile monitored containers after reload");
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }
    }
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(reports),
    }
}

/// Poll the config file until shutdown.
pub async fn watch_config(hosts: Vec<SharedState>) {
    watch_config_with(hosts, POLL_INTERVAL, DEBOUNCE).await
}

pub async fn watch_config_with(hosts: Vec<SharedState>, poll: Duration, debounce: Duration) {
    let Some(state) = hosts.first().cloned() else {
        return;
    };
    let Some(path) = state.loader.path().map(PathBuf::from) else {
        info!("No config file in use, config reload watcher not started");
        return;
    };
    if !state.snapshot().settings.reload_config {
        info!("reload_config is disabled, config reload watcher not started");
        return;
    }
    info!(path = %path.display(), "Watching config file for changes");

    let token = state.shutdown.clone();
    let mut interval = time::interval(poll);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = fingerprint(&path);
    let mut changed_at: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Config reload watcher stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        let current = fingerprint(&path);
        if current != last {
            last = current;
            changed_at = Some(Instant::now());
            debug!(path = %path.display(), "Config file changed");
            continue;
        }

        let Some(since) = changed_at else { continue };
        if since.elapsed() < debounce {
            continue;
        }
        changed_at = None;

        if !state.snapshot().settings.reload_config {
            debug!("reload_config is disabled, ignoring config change");
            continue;
        }
        if last.is_none() {
            error!(path = %path.display(), "Config file disappeared, keeping the previous configuration");
            continue;
        }
        info!("Config change detected, reloading config");
        // Failures are logged inside.
        let _ = apply_reload(&hosts).await;
    }
}
