//! Store error types
//!
//! Error codes:
//! - KV_STORE_NOT_FOUND: the key is absent
//! - KV_STORE_UPDATE_LOG_FAILED: the mutation was applied, the attached logger failed

use thiserror::Error;

use crate::ulog::UlogError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is not present
    #[error("key not found")]
    NotFound,

    /// The local mutation succeeded but its update log notification failed
    #[error("update log failed: {0}")]
    UpdateLog(#[source] Box<UlogError>),
}

impl StoreError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound => "KV_STORE_NOT_FOUND",
            StoreError::UpdateLog(_) => "KV_STORE_UPDATE_LOG_FAILED",
        }
    }

    /// Returns true for an absent key
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

impl From<UlogError> for StoreError {
    fn from(err: UlogError) -> Self {
        StoreError::UpdateLog(Box::new(err))
    }
}
