//! Action module — restart/stop remediation against a container.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::client::runtime::ContainerRuntime;
use crate::docker::client::DockerError;
use crate::throttle::{CooldownKind, CooldownStore};
use crate::rules::MatchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Restart,
    Stop,
}

impl ActionKind {
    pub fn verb(&self) -> &'static str {
        match self {
            ActionKind::Restart => "restart",
            ActionKind::Stop => "stop",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            ActionKind::Restart => "restarted",
            ActionKind::Stop => "stopped",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Container not found: {0}")]
    NotFound(String),
    #[error("Permission denied while trying to {action} {container}")]
    PermissionDenied { action: ActionKind, container: String },
    #[error("Failed to {action} {container}: {source}")]
    Runtime {
        action: ActionKind,
        container: String,
        #[source]
        source: DockerError,
    },
}

impl ActionError {
    fn from_docker(err: DockerError, action: ActionKind, container: &str) -> Self {
        match err {
            DockerError::ContainerNotFound(name) => ActionError::NotFound(name),
            DockerError::PermissionDenied => ActionError::PermissionDenied {
                action,
                container: container.to_string(),
            },
            other => ActionError::Runtime {
                action,
                container: container.to_string(),
                source: other,
            },
        }
    }
}

/// Result of one executed action, carried into the notification title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub kind: ActionKind,
    pub container: String,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Issue `kind` against `container`.
pub async fn execute(
    runtime: &dyn ContainerRuntime,
    container: &str,
    kind: ActionKind,
) -> Result<(), ActionError> {
    let result = match kind {
        ActionKind::Restart => runtime.restart(container).await,
        ActionKind::Stop => runtime.stop(container).await,
    };
    result.map_err(|e| ActionError::from_docker(e, kind, container))
}

/// Runs the actions attached to matched rules, each gated by its own
/// action-cooldown key.
pub struct ActionTrigger<'a> {
    runtime: &'a dyn ContainerRuntime,
    cooldowns: &'a CooldownStore,
}

impl<'a> ActionTrigger<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, cooldowns: &'a CooldownStore) -> Self {
        Self { runtime, cooldowns }
    }

    /// Execute every eligible action among `events`, in event order.
    ///
    /// Each rule is checked against its own action-cooldown key, but one
    /// entry runs each action kind at most once: when two matched rules both
    /// ask for a restart, the container is restarted once, by the first rule.
    /// The later rule's cooldown is left untouched, so it can still fire on
    /// a later entry. Different kinds (restart, then stop) both run.
    pub async fn run(&self, events: &[MatchEvent], now: Instant) -> Vec<ActionOutcome> {
        let mut outcomes: Vec<ActionOutcome> = Vec::new();

        for event in events {
            let Some(kind) = event.rule.action else {
                continue;
            };
            if outcomes.iter().any(|o| o.kind == kind) {
                continue;
            }
            let window = event.settings.action_cooldown;
            if !self.cooldowns.try_acquire(
                &event.entity,
                &event.rule.id,
                CooldownKind::Action,
                window,
                now,
            ) {
                info!(
                    container = %event.entity,
                    rule = %event.rule.id,
                    action = %kind,
                    cooldown_secs = window.as_secs(),
                    "Action skipped, still cooling down"
                );
                continue;
            }

            warn!(container = %event.entity, rule = %event.rule.id, action = %kind, "Executing container action");
            let outcome = match execute(self.runtime, &event.entity, kind).await {
                Ok(()) => {
                    info!(container = %event.entity, action = %kind, "Container {}", kind.past_tense());
                    ActionOutcome {
                        kind,
                        container: event.entity.to_string(),
                        error: None,
                    }
                }
                Err(e) => {
                    error!(container = %event.entity, action = %kind, error = %e, "Container action failed");
                    ActionOutcome {
                        kind,
                        container: event.entity.to_string(),
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}
