//! Docker module — bollard-backed daemon access used by the live runtime.

pub mod client;
pub mod container;
pub mod event;
pub mod host;
pub mod stream;
