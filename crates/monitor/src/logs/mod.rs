//! Logs module — turning raw Docker frames into logical log entries.

pub mod group;
pub mod pattern;
pub mod split;

pub use group::MultilineGrouper;
pub use pattern::PatternDetector;
pub use split::LineSplitter;
