//! Message queue error types
//!
//! Error codes:
//! - KV_MQ_IO_ERROR: a segment file could not be created, written or read
//! - KV_MQ_CORRUPTION: a frame failed its checksum or is truncated
//! - KV_MQ_CLOSED: the queue was closed
//! - KV_MQ_RECORD_TOO_LARGE: a payload does not fit a frame
//! - KV_MQ_INVALID_CONFIG: queue configuration rejected

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for message queue operations
pub type MqResult<T> = Result<T, MqError>;

/// Message queue errors
#[derive(Debug, Error)]
pub enum MqError {
    /// Filesystem failure
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A stored frame is damaged
    #[error("corrupt frame in {} at byte {offset}: {reason}", segment.display())]
    Corruption {
        segment: PathBuf,
        offset: u64,
        reason: String,
    },

    /// The queue has been closed
    #[error("message queue is closed")]
    Closed,

    /// Payload longer than a frame can describe
    #[error("record of {len} bytes exceeds the frame limit")]
    RecordTooLarge { len: usize },

    /// Configuration rejected by validation
    #[error("invalid queue configuration: {0}")]
    InvalidConfig(String),
}

impl MqError {
    /// Create an I/O error with context
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a corruption error at a segment offset
    pub fn corruption(segment: impl Into<PathBuf>, offset: u64, reason: impl Into<String>) -> Self {
        Self::Corruption {
            segment: segment.into(),
            offset,
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "KV_MQ_IO_ERROR",
            Self::Corruption { .. } => "KV_MQ_CORRUPTION",
            Self::Closed => "KV_MQ_CLOSED",
            Self::RecordTooLarge { .. } => "KV_MQ_RECORD_TOO_LARGE",
            Self::InvalidConfig(_) => "KV_MQ_INVALID_CONFIG",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_display_names_location() {
        let err = MqError::corruption("/tmp/q.0000000003", 128, "checksum mismatch");
        let display = err.to_string();
        assert!(display.contains("q.0000000003"));
        assert!(display.contains("128"));
        assert!(display.contains("checksum mismatch"));
        assert_eq!(err.code(), "KV_MQ_CORRUPTION");
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;
        let err = MqError::io("open segment", io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert!(err.source().is_some());
        assert_eq!(err.code(), "KV_MQ_IO_ERROR");
    }
}
