//! Cooldown store — last-fired instants keyed by (container, rule, kind).
//!
//! Notification and action windows are tracked on separate clocks so a
//! suppressed notification never delays an action and vice versa. State is
//! in memory only and starts empty on every process start.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::rules::RuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownKind {
    Notification,
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CooldownKey {
    container: Arc<str>,
    rule: RuleId,
    kind: CooldownKind,
}

#[derive(Debug, Default)]
pub struct CooldownStore {
    last_fired: DashMap<CooldownKey, Instant>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records `now` when the window for the key has
    /// elapsed (or the key never fired). Returns false and leaves the
    /// recorded instant untouched otherwise.
    ///
    /// The check and the update happen under the key's shard lock, so two
    /// concurrent callers on the same key cannot both win.
    pub fn try_acquire(
        &self,
        container: &str,
        rule: &RuleId,
        kind: CooldownKind,
        window: Duration,
        now: Instant,
    ) -> bool {
        let key = CooldownKey {
            container: Arc::from(container),
            rule: rule.clone(),
            kind,
        };

        match self.last_fired.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                if now.saturating_duration_since(*slot.get()) >= window {
                    slot.insert(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Drop every key of a container that is no longer monitored.
    pub fn forget_container(&self, container: &str) {
        self.last_fired.retain(|key, _| &*key.container != container);
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }
}
