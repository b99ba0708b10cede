//! Client module — the container runtime seam.
//!
//! `runtime.rs` defines the trait the pipeline talks to, `live.rs` backs it
//! with bollard, `fake.rs` is an in-memory double for tests.

pub mod fake;
pub mod live;
pub mod runtime;

pub use fake::FakeRuntime;
pub use live::LiveRuntime;
pub use runtime::{ContainerRuntime, SharedRuntime};
