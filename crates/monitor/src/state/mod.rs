//! State module — shared monitor state and log level control.

pub mod level;
pub mod monitor;

pub use level::LogControl;
pub use monitor::{MonitorState, SharedState, TaskSlot};
