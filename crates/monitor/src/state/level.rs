//! Log level control — maps `settings.log_level` onto the live filter.

use tracing::{debug, info, warn};
use tracing_subscriber::{reload, EnvFilter, Registry};

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

pub const DEFAULT_LEVEL: &str = "info";

/// Filter directive for a config level name. Accepts the Python-style
/// names used in existing config files (`WARNING`, `CRITICAL`).
pub fn level_directive(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARNING" | "WARN" => Some("warn"),
        "ERROR" | "CRITICAL" => Some("error"),
        _ => None,
    }
}

/// Filter for this crate at `level`, everything else at warn.
pub fn filter_for(level: &str) -> EnvFilter {
    let directive = level_directive(level).unwrap_or(DEFAULT_LEVEL);
    EnvFilter::new(format!("warn,{}={}", env!("CARGO_CRATE_NAME"), directive))
}

/// Handle onto the reloadable filter layer. Without a handle (`RUST_LOG`
/// was set, or in tests) level changes are ignored.
#[derive(Clone, Default)]
pub struct LogControl {
    handle: Option<FilterHandle>,
}

impl LogControl {
    pub fn new(handle: FilterHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn apply(&self, level: &str) {
        if level_directive(level).is_none() {
            warn!(level, "Unknown log level, using {}", DEFAULT_LEVEL);
        }
        let Some(handle) = &self.handle else {
            debug!(level, "Log level fixed by RUST_LOG, not applying");
            return;
        };
        match handle.reload(filter_for(level)) {
            Ok(()) => info!(level, "Log level applied"),
            Err(e) => warn!(level, error = %e, "Failed to apply log level"),
        }
    }
}
