//! Process-wide counters, logged in the shutdown summary.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Pipeline counters. Relaxed ordering throughout: the values are only
/// ever read for reporting.
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    pub entries: AtomicU64,
    pub matches: AtomicU64,
    pub suppressed: AtomicU64,
    pub alerts: AtomicU64,
    pub deliveries: AtomicU64,
    pub delivery_failures: AtomicU64,
    pub actions: AtomicU64,
    pub action_failures: AtomicU64,
    pub stream_errors: AtomicU64,
    pub reloads: AtomicU64,
    pub reload_failures: AtomicU64,
    /// Gauge: containers with a live monitor task.
    pub monitored: AtomicI64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub entries: u64,
    pub matches: u64,
    pub suppressed: u64,
    pub alerts: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub actions: u64,
    pub action_failures: u64,
    pub stream_errors: u64,
    pub reloads: u64,
    pub reload_failures: u64,
    pub monitored: i64,
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn task_started(&self) {
        self.monitored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_ended(&self) {
        self.monitored.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            entries: get(&self.entries),
            matches: get(&self.matches),
            suppressed: get(&self.suppressed),
            alerts: get(&self.alerts),
            deliveries: get(&self.deliveries),
            delivery_failures: get(&self.delivery_failures),
            actions: get(&self.actions),
            action_failures: get(&self.action_failures),
            stream_errors: get(&self.stream_errors),
            reloads: get(&self.reloads),
            reload_failures: get(&self.reload_failures),
            monitored: self.monitored.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entries={} matches={} suppressed={} alerts={} delivered={} delivery_failures={} actions={} action_failures={} stream_errors={} reloads={}/{}",
            self.entries,
            self.matches,
            self.suppressed,
            self.alerts,
            self.deliveries,
            self.delivery_failures,
            self.actions,
            self.action_failures,
            self.stream_errors,
            self.reloads,
            self.reloads + self.reload_failures,
        )
    }
}
