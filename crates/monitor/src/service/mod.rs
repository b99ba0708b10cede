//! Service module — the long-running monitor tasks.
//!
//! `supervisor` owns the set of container tasks, `monitor` is one such
//! task, `pipeline` handles each entry, `reload` watches the config file
//! and `lifecycle` sends the start/reload/shutdown messages.

pub mod lifecycle;
pub mod monitor;
pub mod pipeline;
pub mod reload;
pub mod supervisor;

pub use pipeline::handle_entry;
pub use reload::{apply_reload, watch_config, ReloadError};
pub use supervisor::{reconcile, start_monitoring, stop_monitoring, watch_events, ReconcileReport};
