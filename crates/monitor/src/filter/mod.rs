//! Filter module — compiled keyword and regex patterns.

pub mod engine;

pub use engine::{FilterError, Haystack, Pattern};
