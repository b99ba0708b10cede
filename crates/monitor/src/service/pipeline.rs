//! Pipeline — what happens to one log entry after it leaves the grouper.
//!
//! match → notification cooldown → (spawned) actions → alert → dispatch.
//! Matching and the cooldown decision run inline on the container task;
//! everything that does I/O runs on the tracker so the log reader never
//! waits on a channel or on the daemon.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use crate::action::{ActionOutcome, ActionTrigger};
use crate::metrics::MonitorMetrics;
use crate::notify::title::{keyword_title, with_action_outcomes};
use crate::notify::{Alert, Attachment};
use crate::rules::{match_entry, LogEntry, MatchEvent};
use crate::state::SharedState;
use crate::throttle::CooldownKind;

/// Evaluate `entry` for container `name` against the active snapshot.
///
/// Returns the handle of the spawned delivery task when at least one event
/// passed its notification cooldown.
pub fn handle_entry(state: &SharedState, name: &str, entry: LogEntry) -> Option<JoinHandle<()>> {
    let snapshot = state.snapshot();
    let entity = snapshot.entity(name)?;
    MonitorMetrics::incr(&state.metrics.entries);

    let events = match_entry(entity, &entry);
    if events.is_empty() {
        return None;
    }
    MonitorMetrics::add(&state.metrics.matches, events.len() as u64);

    let now = state.clock.now();
    let emitted = throttle(state, events, now);
    if emitted.is_empty() {
        return None;
    }

    let state = Arc::clone(state);
    let tracker = state.tracker.clone();
    Some(tracker.spawn(async move { deliver(&state, emitted, now).await }.in_current_span()))
}

/// Keep the events whose notification window is open, recording each hit.
fn throttle(state: &SharedState, events: Vec<MatchEvent>, now: Instant) -> Vec<MatchEvent> {
    events
        .into_iter()
        .filter(|event| {
            let window = event.settings.notification_cooldown;
            let open = state.cooldowns.try_acquire(
                &event.entity,
                &event.rule.id,
                CooldownKind::Notification,
                window,
                now,
            );
            if !open {
                MonitorMetrics::incr(&state.metrics.suppressed);
                debug!(
                    container = %event.entity,
                    rule = %event.rule.id,
                    cooldown_secs = window.as_secs(),
                    "Match suppressed by notification cooldown"
                );
            }
            open
        })
        .collect()
}

async fn deliver(state: &SharedState, events: Vec<MatchEvent>, now: Instant) {
    let outcomes = ActionTrigger::new(state.runtime.as_ref(), &state.cooldowns)
        .run(&events, now)
        .await;
    for outcome in &outcomes {
        if outcome.succeeded() {
            MonitorMetrics::incr(&state.metrics.actions);
        } else {
            MonitorMetrics::incr(&state.metrics.action_failures);
        }
    }

    let Some(alert) = build_alert(state, &events, &outcomes).await else {
        return;
    };
    MonitorMetrics::incr(&state.metrics.alerts);

    let report = state.dispatcher.dispatch(&alert).await;
    MonitorMetrics::add(&state.metrics.deliveries, report.delivered.len() as u64);
    MonitorMetrics::add(&state.metrics.delivery_failures, report.failed.len() as u64);
}

/// One alert for all emitted events of an entry. The first event decides
/// title template and channels; any event asking for the log file gets it
/// attached. With several hosts the title names the host.
pub async fn build_alert(
    state: &SharedState,
    events: &[MatchEvent],
    outcomes: &[ActionOutcome],
) -> Option<Alert> {
    let first = events.first()?;
    let entity = first.entity.to_string();
    let labels: Vec<String> = events.iter().map(|e| e.label.clone()).collect();

    let title = keyword_title(&entity, &labels, &first.settings.notification_title);
    let title = with_action_outcomes(title, outcomes);

    let message = events
        .iter()
        .find_map(|e| e.rendered.clone())
        .unwrap_or_else(|| first.entry.trim().to_string());

    let attachment = match events.iter().find(|e| e.settings.attach_logfile) {
        Some(event) => {
            let lines = event.settings.attachment_lines;
            match state.runtime.tail_logs(&entity, lines).await {
                Ok(content) => Some(Attachment::log_tail(&entity, lines, content)),
                Err(e) => {
                    warn!(container = %entity, error = %e, "Could not read log tail for attachment");
                    None
                }
            }
        }
        None => None,
    };

    let alert = Alert {
        title,
        message,
        container: Some(entity),
        keywords: labels,
        attachment,
        channels: first.settings.channels.clone(),
        host: None,
    };
    Some(alert.on_host(state.host()))
}
