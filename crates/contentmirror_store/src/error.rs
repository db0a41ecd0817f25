//! Error types for content stores.

use contentmirror_core::CoreError;
use contentmirror_protocol::SourceError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// "Not found" is never an error: lookups return `Ok(None)` or an empty result.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The filter is malformed, too complex, or uses an operator the backend
    /// cannot evaluate. Raised before any backend I/O.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The backend does not implement this operation.
    #[error("{operation} is not supported by the {backend} store")]
    Unsupported {
        /// Backend name.
        backend: &'static str,
        /// Operation name.
        operation: &'static str,
    },

    /// The underlying database failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote content source failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// A stored record could not be decoded.
    #[error("record error: {0}")]
    Core(#[from] CoreError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::Unsupported {
            backend: "remote",
            operation: "index",
        };
        assert_eq!(err.to_string(), "index is not supported by the remote store");

        let err = StoreError::invalid_query("query too complex");
        assert_eq!(err.to_string(), "invalid query: query too complex");
    }
}
