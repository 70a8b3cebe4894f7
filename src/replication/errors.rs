//! Replication error types
//!
//! Error codes:
//! - KV_REPL_APPLY_FAILED: a record could not be decoded or applied
//! - KV_REPL_TRANSPORT_FAILED: the queue failed while reading
//! - KV_REPL_INVALID_CONFIG: follower configuration rejected

use thiserror::Error;

use crate::mq::MqError;
use crate::ulog::UlogError;

/// Result type for replication operations
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Replication errors
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// Decoding or applying a record failed
    #[error("failed to apply update record: {0}")]
    Apply(#[from] UlogError),

    /// Reading from the queue failed
    #[error("failed to read update queue: {0}")]
    Queue(#[from] MqError),

    /// Configuration rejected by validation
    #[error("invalid replication configuration: {0}")]
    InvalidConfig(String),
}

impl ReplicationError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Apply(_) => "KV_REPL_APPLY_FAILED",
            Self::Queue(_) => "KV_REPL_TRANSPORT_FAILED",
            Self::InvalidConfig(_) => "KV_REPL_INVALID_CONFIG",
        }
    }

    /// Returns true if the failure is a damaged record
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Apply(e) => e.is_corruption(),
            Self::Queue(e) => matches!(e, MqError::Corruption { .. }),
            Self::InvalidConfig(_) => false,
        }
    }
}
