//! Runtime trait — everything the monitor needs from the container engine.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::docker::client::DockerError;
use crate::docker::container::ContainerInfo;
use crate::docker::event::EventStream;
use crate::docker::stream::FrameStream;

pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DockerError>> + Send + 'a>>;

/// Async interface over the container engine.
///
/// Object-safe thanks to `Pin<Box<…>>` returns. Implementations must be
/// `Send + Sync` so they can live inside the shared monitor state.
pub trait ContainerRuntime: Send + Sync {
    // ── Queries ─────────────────────────────────────────────────

    fn list_running(&self) -> RuntimeFuture<'_, Vec<ContainerInfo>>;

    fn inspect<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ContainerInfo>;

    // ── Logs ────────────────────────────────────────────────────

    /// Follow new log output of `name` from `since` (Unix seconds).
    fn stream_logs(&self, name: &str, since: i64) -> FrameStream;

    fn tail_logs<'a>(&'a self, name: &'a str, lines: usize) -> RuntimeFuture<'a, String>;

    // ── Lifecycle ───────────────────────────────────────────────

    fn restart<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ()>;

    fn stop<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ()>;

    // ── Events ──────────────────────────────────────────────────

    fn events(&self) -> EventStream;
}

pub type SharedRuntime = Arc<dyn ContainerRuntime>;
