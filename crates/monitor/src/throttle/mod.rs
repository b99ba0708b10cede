//! Throttle module — per (container, rule) cooldown windows.

pub mod clock;
pub mod cooldown;

pub use clock::{Clock, SystemClock};
pub use cooldown::{CooldownKind, CooldownStore};
