//! Fake — test double for the container runtime.
//!
//! Provides a deterministic [`FakeRuntime`] that implements
//! [`ContainerRuntime`] using in-memory state. Log lines and lifecycle events
//! are pushed by the test and delivered through channels, so the full
//! pipeline can be exercised without a running Docker daemon.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::client::runtime::{ContainerRuntime, RuntimeFuture};
use crate::docker::client::DockerError;
use crate::docker::container::ContainerInfo;
use crate::docker::event::{ContainerEvent, EventStream};
use crate::docker::stream::{FrameStream, LogFrame};

// ── In-memory state ─────────────────────────────────────────────

/// Lifecycle call recorded by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Restart(String),
    Stop(String),
}

#[derive(Default)]
struct Inner {
    containers: HashMap<String, ContainerInfo>,
    history: HashMap<String, Vec<String>>,
    log_senders: HashMap<String, Vec<mpsc::UnboundedSender<Result<LogFrame, DockerError>>>>,
    actions: Vec<RecordedAction>,
    restarts: u64,
}

/// A fake container engine for deterministic testing.
pub struct FakeRuntime {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ContainerEvent>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a running container.
    pub fn add_running(&self, name: &str) {
        let info = ContainerInfo {
            id: format!("id-{}", name),
            name: name.to_string(),
            running: true,
            started_at: Some("2026-01-01T00:00:00Z".to_string()),
        };
        self.lock().containers.insert(name.to_string(), info);
    }

    /// Mark a container stopped and end its log streams.
    pub fn set_stopped(&self, name: &str) {
        let mut state = self.lock();
        if let Some(info) = state.containers.get_mut(name) {
            info.running = false;
        }
        state.log_senders.remove(name);
    }

    /// Append a log chunk; it is delivered to every open stream of `name`.
    /// Returns how many streams received it.
    pub fn push_log(&self, name: &str, chunk: &str) -> usize {
        let mut state = self.lock();
        state
            .history
            .entry(name.to_string())
            .or_default()
            .extend(chunk.lines().map(str::to_string));

        let Some(senders) = state.log_senders.get_mut(name) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        let frame = LogFrame::stdout(Bytes::from(chunk.to_string()));
        senders
            .iter()
            .filter(|tx| tx.send(Ok(frame.clone())).is_ok())
            .count()
    }

    /// Inject a stream error into every open stream of `name`.
    pub fn fail_stream(&self, name: &str) {
        let mut state = self.lock();
        if let Some(senders) = state.log_senders.get_mut(name) {
            for tx in senders.iter() {
                let _ = tx.send(Err(DockerError::StreamClosed));
            }
        }
    }

    /// Number of currently open log streams for `name`.
    pub fn open_streams(&self, name: &str) -> usize {
        self.lock()
            .log_senders
            .get(name)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Publish a lifecycle event to every `events()` subscriber.
    pub fn emit(&self, event: ContainerEvent) {
        let _ = self.events.send(event);
    }

    pub fn actions(&self) -> Vec<RecordedAction> {
        self.lock().actions.clone()
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// ── ContainerRuntime implementation ─────────────────────────────

impl ContainerRuntime for FakeRuntime {
    fn list_running(&self) -> RuntimeFuture<'_, Vec<ContainerInfo>> {
        Box::pin(async move {
            let state = self.lock();
            let mut running: Vec<ContainerInfo> =
                state.containers.values().filter(|c| c.running).cloned().collect();
            running.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(running)
        })
    }

    fn inspect<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ContainerInfo> {
        Box::pin(async move {
            self.lock()
                .containers
                .get(name)
                .cloned()
                .ok_or_else(|| DockerError::ContainerNotFound(name.to_string()))
        })
    }

    fn stream_logs(&self, name: &str, _since: i64) -> FrameStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()
            .log_senders
            .entry(name.to_string())
            .or_default()
            .push(tx);
        Box::pin(UnboundedReceiverStream::new(rx))
    }

    fn tail_logs<'a>(&'a self, name: &'a str, lines: usize) -> RuntimeFuture<'a, String> {
        Box::pin(async move {
            let state = self.lock();
            let history = state
                .history
                .get(name)
                .ok_or_else(|| DockerError::ContainerNotFound(name.to_string()))?;
            let start = history.len().saturating_sub(lines);
            Ok(history[start..].join("\n"))
        })
    }

    fn restart<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.restarts += 1;
            let restarts = state.restarts;
            let info = state
                .containers
                .get_mut(name)
                .ok_or_else(|| DockerError::ContainerNotFound(name.to_string()))?;
            info.running = true;
            info.started_at = Some(format!("2026-01-01T00:00:{:02}Z", restarts % 60));
            state.actions.push(RecordedAction::Restart(name.to_string()));
            Ok(())
        })
    }

    fn stop<'a>(&'a self, name: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            let info = state
                .containers
                .get_mut(name)
                .ok_or_else(|| DockerError::ContainerNotFound(name.to_string()))?;
            info.running = false;
            state.actions.push(RecordedAction::Stop(name.to_string()));
            Ok(())
        })
    }

    fn events(&self) -> EventStream {
        let mut rx = self.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield Ok(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_pushed_lines_reach_open_stream() {
        let fake = FakeRuntime::new();
        fake.add_running("web");
        let mut stream = fake.stream_logs("web", 0);

        assert_eq!(fake.push_log("web", "hello\n"), 1);
        let frame = stream.next().await.unwrap().unwrap();
        assert_eq!(&frame.content[..], b"hello\n");
    }

    #[tokio::test]
    async fn test_tail_returns_last_lines() {
        let fake = FakeRuntime::new();
        fake.add_running("web");
        fake.push_log("web", "a\nb\nc\n");
        assert_eq!(fake.tail_logs("web", 2).await.unwrap(), "b\nc");
    }

    #[tokio::test]
    async fn test_restart_unknown_container_fails() {
        let fake = FakeRuntime::new();
        let err = fake.restart("ghost").await.unwrap_err();
        assert!(matches!(err, DockerError::ContainerNotFound(_)));
        assert!(fake.actions().is_empty());
    }

    #[tokio::test]
    async fn test_stop_marks_not_running() {
        let fake = FakeRuntime::new();
        fake.add_running("web");
        fake.stop("web").await.unwrap();
        assert!(!fake.inspect("web").await.unwrap().running);
        assert_eq!(fake.actions(), vec![RecordedAction::Stop("web".to_string())]);
    }
}
