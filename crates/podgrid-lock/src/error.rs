//! Lock error types.

use std::time::Duration;

use thiserror::Error;

use crate::backend::LeaseId;

/// Result type alias for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur while acquiring or releasing a lock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("lock key is empty")]
    KeyIsEmpty,

    #[error("lease ttl must be positive")]
    InvalidTtl,

    #[error("timed out after {after:?} on lock {key}")]
    Timeout { key: String, after: Duration },

    #[error("lease not found: {0}")]
    LeaseNotFound(LeaseId),

    #[error("lock {0} is not held by this lease")]
    NotHeld(String),
}
