//! Log frames as delivered by the daemon, before line splitting.

use std::pin::Pin;

use bollard::container::LogOutput;
use bytes::Bytes;
use tokio_stream::Stream;

use super::client::DockerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout = 0,
    Stderr = 1,
}

/// One multiplexed frame from `docker logs`. A frame may hold several
/// lines, or only part of one when the daemon splits long output.
#[derive(Debug, Clone)]
pub struct LogFrame {
    pub timestamp: i64, // Unix nanoseconds
    pub stream_type: StreamKind,
    pub content: Bytes,
}

impl LogFrame {
    pub fn stdout(content: impl Into<Bytes>) -> Self {
        Self {
            timestamp: now_nanos(),
            stream_type: StreamKind::Stdout,
            content: content.into(),
        }
    }
}

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<LogFrame, DockerError>> + Send>>;

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

/// Convert bollard output into a frame, peeling off the RFC3339 prefix
/// that `timestamps: true` adds.
pub(crate) fn convert_bollard_log(output: LogOutput) -> LogFrame {
    let (stream_type, raw_bytes) = match output {
        LogOutput::StdOut { message } => (StreamKind::Stdout, message),
        LogOutput::StdErr { message } => (StreamKind::Stderr, message),
        LogOutput::StdIn { message } => (StreamKind::Stdout, message),
        LogOutput::Console { message } => (StreamKind::Stdout, message),
    };

    let parsed = raw_bytes
        .iter()
        .position(|&b| b == b' ')
        .and_then(|idx| {
            let ts_str = std::str::from_utf8(&raw_bytes[..idx]).ok()?;
            let dt = chrono::DateTime::parse_from_rfc3339(ts_str).ok()?;
            Some((dt.timestamp_nanos_opt().unwrap_or_else(now_nanos), idx + 1))
        });

    let (timestamp, content) = match parsed {
        Some((ts, msg_start)) if msg_start < raw_bytes.len() => (ts, raw_bytes.slice(msg_start..)),
        Some((ts, _)) => (ts, Bytes::new()),
        None => (now_nanos(), raw_bytes),
    };

    LogFrame {
        timestamp,
        stream_type,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_strips_timestamp_prefix() {
        let output = LogOutput::StdOut {
            message: Bytes::from_static(b"2026-02-05T10:00:00.123456789Z ERROR db down\n"),
        };
        let frame = convert_bollard_log(output);
        assert_eq!(frame.stream_type, StreamKind::Stdout);
        assert_eq!(&frame.content[..], b"ERROR db down\n");
        assert_eq!(frame.timestamp, 1_770_285_600_123_456_789);
    }

    #[test]
    fn test_convert_keeps_content_without_timestamp() {
        let output = LogOutput::StdErr {
            message: Bytes::from_static(b"plain line without prefix"),
        };
        let frame = convert_bollard_log(output);
        assert_eq!(frame.stream_type, StreamKind::Stderr);
        assert_eq!(&frame.content[..], b"plain line without prefix");
        assert!(frame.timestamp > 0);
    }

    #[test]
    fn test_convert_timestamp_only_frame() {
        let output = LogOutput::StdOut {
            message: Bytes::from_static(b"2026-02-05T10:00:00Z "),
        };
        let frame = convert_bollard_log(output);
        assert!(frame.content.is_empty());
    }
}
