//! Multiline grouper — assembles physical lines into logical entries.
//!
//! - Boundaries come from the container's detected start patterns
//! - A pending entry is flushed when a new start line arrives, when it
//!   reaches `max_lines`, after `timeout` without new lines, and at stream end
//! - Until a start pattern is known every line is its own entry
//! - Passthrough mode disables grouping entirely

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::pattern::PatternDetector;
use crate::rules::LogEntry;

enum GroupAction {
    FlushAndStartNew,
    AddToCurrent,
    StartNew,
}

pub struct MultilineGrouper {
    detector: Option<PatternDetector>,
    pending: Option<PendingEntry>,
    timeout: Duration,
    max_lines: usize,
    last_update: Option<Instant>,
}

struct PendingEntry {
    lines: Vec<String>,
    timestamp: i64,
}

impl PendingEntry {
    fn into_entry(self) -> LogEntry {
        LogEntry {
            line_count: self.lines.len(),
            text: self.lines.join("\n"),
            timestamp: self.timestamp,
        }
    }
}

impl MultilineGrouper {
    pub fn new(entity: &str, timeout: Duration, max_lines: usize) -> Self {
        Self {
            detector: Some(PatternDetector::new(entity)),
            pending: None,
            timeout,
            max_lines: max_lines.max(1),
            last_update: None,
        }
    }

    /// A grouper that emits every line as its own entry.
    pub fn passthrough() -> Self {
        Self {
            detector: None,
            pending: None,
            timeout: Duration::ZERO,
            max_lines: 1,
            last_update: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.detector.is_none()
    }

    /// Learn from history without emitting anything.
    pub fn seed(&mut self, history: &str) {
        if let Some(detector) = self.detector.as_mut() {
            detector.observe_block(history);
        }
    }

    /// Whether grouping is active (a start pattern has been found).
    pub fn is_grouping(&self) -> bool {
        self.detector.as_ref().is_some_and(PatternDetector::has_patterns)
    }

    /// Process one line. Returns entries that are ready to be matched.
    pub fn process(&mut self, line: String, timestamp: i64, now: Instant) -> Vec<LogEntry> {
        let Some(detector) = self.detector.as_mut() else {
            return vec![LogEntry::single(line, timestamp)];
        };
        if detector.is_scanning() {
            detector.observe(&line);
        }
        if !detector.has_patterns() {
            let mut ready: Vec<LogEntry> = self.flush().into_iter().collect();
            ready.push(LogEntry::single(line, timestamp));
            return ready;
        }
        let is_start = detector.is_entry_start(&line);

        if self.is_expired(now) {
            debug!(timeout_ms = self.timeout.as_millis() as u64, "multiline: timeout expired, flushing pending entry");
            let flushed = self.flush();
            self.start_new(line, timestamp, now);
            return flushed.into_iter().collect();
        }

        let action = match &self.pending {
            None => GroupAction::StartNew,
            Some(_) if is_start => {
                trace!("multiline: start pattern matched, flushing");
                GroupAction::FlushAndStartNew
            }
            Some(pending) if pending.lines.len() >= self.max_lines => {
                debug!(max_lines = self.max_lines, "multiline: max_lines limit reached, flushing");
                GroupAction::FlushAndStartNew
            }
            Some(_) => GroupAction::AddToCurrent,
        };

        match action {
            GroupAction::FlushAndStartNew => {
                let complete = self.flush();
                self.start_new(line, timestamp, now);
                complete.into_iter().collect()
            }
            GroupAction::AddToCurrent => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.lines.push(line);
                    self.last_update = Some(now);
                }
                Vec::new()
            }
            GroupAction::StartNew => {
                self.start_new(line, timestamp, now);
                Vec::new()
            }
        }
    }

    /// Flush the pending entry if it has been idle past the timeout.
    pub fn check_timeout(&mut self, now: Instant) -> Option<LogEntry> {
        if self.is_expired(now) {
            debug!("multiline: idle timeout flush");
            return self.flush();
        }
        None
    }

    /// When the pending entry will time out, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        self.last_update.map(|last| last + self.timeout)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Flush the pending entry (stream end, timeout, shutdown).
    pub fn flush(&mut self) -> Option<LogEntry> {
        self.last_update = None;
        self.pending.take().map(PendingEntry::into_entry)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.pending.is_some()
            && self
                .last_update
                .is_some_and(|last| now.saturating_duration_since(last) > self.timeout)
    }

    fn start_new(&mut self, line: String, timestamp: i64, now: Instant) {
        self.pending = Some(PendingEntry {
            lines: vec![line],
            timestamp,
        });
        self.last_update = Some(now);
    }
}
