//! Update log error types
//!
//! Error codes:
//! - KV_ULOG_CORRUPTION: record bytes are malformed or truncated
//! - KV_ULOG_INVALID_RECORD: caller assembled an impossible mutation
//! - KV_ULOG_STORE_FAILED: the target store rejected a replayed mutation
//! - KV_ULOG_TRANSPORT_FAILED: the queue refused an append
//!
//! A record whose ids do not match a replay filter is not an error; see
//! `ApplyOutcome::NotApplicable`.

use thiserror::Error;

use crate::mq::MqError;
use crate::store::StoreError;

/// Result type for update log operations
pub type UlogResult<T> = Result<T, UlogError>;

/// Update log errors
#[derive(Debug, Error)]
pub enum UlogError {
    /// Unknown opcode, truncated varint, or body shorter than declared.
    #[error("corrupt update record: {reason}")]
    Corruption { reason: String },

    /// Mutation parts that cannot form a record (e.g. CLEAR with a key).
    #[error("invalid update record: {reason}")]
    InvalidRecord { reason: String },

    /// Failure reported by the store a mutation was applied to.
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Failure reported by the queue a record was appended to.
    #[error("update log transport failed: {0}")]
    Queue(#[from] MqError),
}

impl UlogError {
    /// Create a corruption error
    pub fn corruption(reason: impl Into<String>) -> Self {
        Self::Corruption {
            reason: reason.into(),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Corruption { .. } => "KV_ULOG_CORRUPTION",
            Self::InvalidRecord { .. } => "KV_ULOG_INVALID_RECORD",
            Self::Store(_) => "KV_ULOG_STORE_FAILED",
            Self::Queue(_) => "KV_ULOG_TRANSPORT_FAILED",
        }
    }

    /// Returns true for malformed record bytes
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(UlogError::corruption("x").code(), "KV_ULOG_CORRUPTION");
        assert_eq!(UlogError::invalid_record("x").code(), "KV_ULOG_INVALID_RECORD");
        assert_eq!(
            UlogError::from(StoreError::NotFound).code(),
            "KV_ULOG_STORE_FAILED"
        );
        assert_eq!(UlogError::from(MqError::Closed).code(), "KV_ULOG_TRANSPORT_FAILED");
    }

    #[test]
    fn test_display_carries_reason() {
        let err = UlogError::corruption("truncated varint after 1 bytes");
        let display = err.to_string();
        assert!(display.contains("corrupt update record"));
        assert!(display.contains("truncated varint"));
    }

    #[test]
    fn test_only_corruption_is_corruption() {
        assert!(UlogError::corruption("x").is_corruption());
        assert!(!UlogError::invalid_record("x").is_corruption());
        assert!(!UlogError::from(MqError::Closed).is_corruption());
    }
}
