//! Monitor state — everything the pipeline tasks of one Docker host share.
//!
//! With several hosts there is one state per host. They share the config
//! snapshot, dispatcher, metrics, cancellation root and task tracker; task
//! registry and cooldowns are per host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info_span, Span};

use super::level::LogControl;
use crate::client::SharedRuntime;
use crate::conf::{ConfigLoader, ConfigSnapshot};
use crate::metrics::MonitorMetrics;
use crate::notify::Dispatcher;
use crate::throttle::{Clock, CooldownStore, SystemClock};

/// Registry entry of a running container task.
#[derive(Debug, Clone)]
pub struct TaskSlot {
    pub token: CancellationToken,
    pub generation: u64,
}

pub struct MonitorState {
    config: Arc<ArcSwap<ConfigSnapshot>>,
    pub loader: ConfigLoader,
    pub runtime: SharedRuntime,
    /// Set only when more than one host is monitored.
    host: Option<Arc<str>>,
    pub dispatcher: Dispatcher,
    pub cooldowns: CooldownStore,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<MonitorMetrics>,
    pub log_control: LogControl,
    /// Container name -> its monitor task.
    tasks: DashMap<String, TaskSlot>,
    generation: AtomicU64,
    /// Root of the cancellation tree; every container task holds a child.
    pub shutdown: CancellationToken,
    /// Container tasks plus in-flight notification/action work.
    pub tracker: TaskTracker,
}

impl MonitorState {
    pub fn new(
        snapshot: ConfigSnapshot,
        loader: ConfigLoader,
        runtime: SharedRuntime,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(snapshot)),
            loader,
            runtime,
            host: None,
            dispatcher,
            cooldowns: CooldownStore::new(),
            clock: Arc::new(SystemClock),
            metrics: Arc::new(MonitorMetrics::new()),
            log_control: LogControl::disabled(),
            tasks: DashMap::new(),
            generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_log_control(mut self, control: LogControl) -> Self {
        self.log_control = control;
        self
    }

    pub fn with_host(mut self, host: impl Into<Arc<str>>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// State for another daemon, sharing everything except the runtime,
    /// task registry and cooldowns.
    pub fn sibling(&self, host: impl Into<Arc<str>>, runtime: SharedRuntime) -> Self {
        Self {
            config: Arc::clone(&self.config),
            loader: self.loader.clone(),
            runtime,
            host: Some(host.into()),
            dispatcher: self.dispatcher.clone(),
            cooldowns: CooldownStore::new(),
            clock: Arc::clone(&self.clock),
            metrics: Arc::clone(&self.metrics),
            log_control: self.log_control.clone(),
            tasks: DashMap::new(),
            generation: AtomicU64::new(0),
            shutdown: self.shutdown.clone(),
            tracker: self.tracker.clone(),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Span for work on this host; disabled with a single host.
    pub fn span(&self) -> Span {
        match self.host() {
            Some(host) => info_span!("docker", host),
            None => Span::none(),
        }
    }

    // ── Config snapshot ─────────────────────────────────────────

    /// The active snapshot. Callers keep the `Arc` for the duration of one
    /// unit of work so a concurrent reload never changes it under them.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.config.load_full()
    }

    /// Replace the active snapshot, returning the previous one.
    pub fn swap(&self, snapshot: ConfigSnapshot) -> Arc<ConfigSnapshot> {
        self.config.swap(Arc::new(snapshot))
    }

    // ── Task registry ───────────────────────────────────────────

    /// Reserve a slot for `name`. Returns `None` when a live task already
    /// monitors it or the process is shutting down.
    pub fn claim(&self, name: &str) -> Option<TaskSlot> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        let slot = TaskSlot {
            token: self.shutdown.child_token(),
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
        };
        match self.tasks.entry(name.to_string()) {
            Entry::Occupied(mut existing) => {
                if !existing.get().token.is_cancelled() {
                    return None;
                }
                existing.insert(slot.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot.clone());
            }
        }
        Some(slot)
    }

    /// Cancel and forget the task for `name`. Returns whether one existed.
    pub fn cancel(&self, name: &str) -> bool {
        match self.tasks.remove(name) {
            Some((_, slot)) => {
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop the slot of a finished task, unless a newer task took it over.
    pub fn release(&self, name: &str, generation: u64) {
        self.tasks.remove_if(name, |_, slot| slot.generation == generation);
    }

    pub fn is_monitoring(&self, name: &str) -> bool {
        self.tasks
            .get(name)
            .map(|slot| !slot.token.is_cancelled())
            .unwrap_or(false)
    }

    pub fn monitored(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tasks
            .iter()
            .filter(|slot| !slot.token.is_cancelled())
            .map(|slot| slot.key().clone())
            .collect();
        names.sort();
        names
    }
}

pub type SharedState = Arc<MonitorState>;
