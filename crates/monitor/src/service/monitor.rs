//! Container monitor — follows one container's log stream until it stops,
//! restarts, fails too often, or the task is cancelled.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::pipeline::handle_entry;
use crate::docker::client::DockerError;
use crate::logs::pattern::DETECTION_TAIL_LINES;
use crate::logs::{LineSplitter, MultilineGrouper};
use crate::metrics::MonitorMetrics;
use crate::rules::LogEntry;
use crate::state::SharedState;

pub const MAX_STREAM_ERRORS: usize = 5;
pub const ERROR_WINDOW: Duration = Duration::from_secs(60);
pub const RECONNECT_BASE: Duration = Duration::from_secs(1);
pub const RECONNECT_JITTER_MS: u64 = 500;

/// Slack added to the grouper deadline so the idle check lands past it.
const FLUSH_SLACK: Duration = Duration::from_millis(1);

/// Why a container task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    NotRunning,
    Restarted,
    TooManyErrors,
    Gone(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::NotRunning => f.write_str("container is not running"),
            StopReason::Restarted => f.write_str("container was restarted"),
            StopReason::TooManyErrors => write!(
                f,
                "more than {} stream errors within {}s",
                MAX_STREAM_ERRORS,
                ERROR_WINDOW.as_secs()
            ),
            StopReason::Gone(reason) => write!(f, "container unavailable: {}", reason),
        }
    }
}

enum StreamEnd {
    Cancelled,
    Closed,
    Failed(DockerError),
}

/// Sliding window of recent stream failures.
#[derive(Debug)]
pub struct ErrorWindow {
    hits: VecDeque<Instant>,
    window: Duration,
    max: usize,
}

impl ErrorWindow {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            hits: VecDeque::with_capacity(max + 1),
            window,
            max,
        }
    }

    /// Record a failure at `now`; returns the failures still in the window.
    pub fn record(&mut self, now: Instant) -> usize {
        self.hits.push_back(now);
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
        self.hits.len()
    }

    pub fn exceeded(&self) -> bool {
        self.hits.len() > self.max
    }
}

/// Linear backoff with jitter for the `attempt`-th reconnect.
pub fn reconnect_delay(attempt: usize) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..=RECONNECT_JITTER_MS);
    RECONNECT_BASE * attempt.max(1) as u32 + Duration::from_millis(jitter)
}

/// Follow `name` until there is a reason to stop.
pub async fn run(state: &SharedState, name: &str, token: &CancellationToken) -> StopReason {
    let started_at = match state.runtime.inspect(name).await {
        Ok(info) if info.running => info.started_at,
        Ok(_) => return StopReason::NotRunning,
        Err(e) => return StopReason::Gone(e.to_string()),
    };

    let mut grouper = new_grouper(state, name).await;
    let mut errors = ErrorWindow::new(MAX_STREAM_ERRORS, ERROR_WINDOW);

    loop {
        match follow(state, name, token, &mut grouper).await {
            StreamEnd::Cancelled => return StopReason::Cancelled,
            StreamEnd::Closed => debug!(container = %name, "Log stream closed"),
            StreamEnd::Failed(e) => {
                MonitorMetrics::incr(&state.metrics.stream_errors);
                warn!(container = %name, error = %e, "Log stream failed");
            }
        }

        match state.runtime.inspect(name).await {
            Ok(info) if !info.running => return StopReason::NotRunning,
            Ok(info) if info.started_at != started_at => return StopReason::Restarted,
            Ok(_) => {}
            Err(e) if e.is_permanent() => return StopReason::Gone(e.to_string()),
            Err(e) => {
                MonitorMetrics::incr(&state.metrics.stream_errors);
                warn!(container = %name, error = %e, "Could not inspect container");
            }
        }

        let attempt = errors.record(Instant::now());
        if errors.exceeded() {
            error!(container = %name, errors = attempt, "Too many log stream errors, giving up");
            return StopReason::TooManyErrors;
        }

        let delay = reconnect_delay(attempt);
        info!(container = %name, attempt, delay_ms = delay.as_millis() as u64, "Reconnecting to log stream");
        tokio::select! {
            _ = token.cancelled() => return StopReason::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn new_grouper(state: &SharedState, name: &str) -> MultilineGrouper {
    let snapshot = state.snapshot();
    if !snapshot.settings.multi_line_entries {
        return MultilineGrouper::passthrough();
    }
    let mut grouper = MultilineGrouper::new(
        name,
        snapshot.multiline_timeout(),
        snapshot.settings.multi_line_max_lines,
    );
    match state.runtime.tail_logs(name, DETECTION_TAIL_LINES).await {
        Ok(history) => grouper.seed(&history),
        Err(e) => debug!(container = %name, error = %e, "No log history for pattern detection"),
    }
    grouper
}

/// Read one stream connection to its end. Pending partial lines and
/// grouped entries are flushed whatever the reason.
async fn follow(
    state: &SharedState,
    name: &str,
    token: &CancellationToken,
    grouper: &mut MultilineGrouper,
) -> StreamEnd {
    let since = chrono::Utc::now().timestamp();
    let mut stream = state.runtime.stream_logs(name, since);
    let mut splitter = LineSplitter::new();
    let mut last_timestamp = 0;

    let end = loop {
        let deadline = grouper.deadline();
        tokio::select! {
            biased;
            _ = token.cancelled() => break StreamEnd::Cancelled,
            _ = idle_deadline(deadline) => {
                if let Some(entry) = grouper.check_timeout(Instant::now()) {
                    submit(state, name, entry);
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(frame)) => {
                    last_timestamp = frame.timestamp;
                    let now = Instant::now();
                    for line in splitter.push(&frame.content) {
                        for entry in grouper.process(line, frame.timestamp, now) {
                            submit(state, name, entry);
                        }
                    }
                }
                Some(Err(e)) => break StreamEnd::Failed(e),
                None => break StreamEnd::Closed,
            }
        }
    };

    if let Some(line) = splitter.finish() {
        for entry in grouper.process(line, last_timestamp, Instant::now()) {
            submit(state, name, entry);
        }
    }
    if let Some(entry) = grouper.flush() {
        submit(state, name, entry);
    }
    end
}

fn submit(state: &SharedState, name: &str, entry: LogEntry) {
    // Delivery runs on the tracker; the handle is not awaited here.
    let _ = handle_entry(state, name, entry);
}

async fn idle_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at + FLUSH_SLACK)).await,
        None => std::future::pending().await,
    }
}
