//! Error types for the sync engine.

use contentmirror_protocol::SourceError;
use contentmirror_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync call.
///
/// Nothing here is retried by the engine itself. Callers reschedule, see
/// [`RetryPolicy`](crate::RetryPolicy).
#[derive(Error, Debug)]
pub enum SyncError {
    /// The content source failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Applying a record or persisting the cursor failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The persisted cursor record is unusable.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// The engine was called from one of its own subscribers.
    #[error("sync engine re-entered from a subscriber")]
    Reentrant,
}

impl SyncError {
    /// Returns true if calling `next` again later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Source(err) => err.is_retryable(),
            SyncError::Store(StoreError::Connection(_)) => true,
            _ => false,
        }
    }
}
