//! Error types for contentmirror core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while decoding or validating records and schemas.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Record is structurally invalid.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// Content type is not registered.
    #[error("unknown content type: {id}")]
    UnknownContentType {
        /// The content type id.
        id: String,
    },

    /// Field does not exist on the content type.
    #[error("content type {content_type} has no field {field}")]
    UnknownField {
        /// The content type id.
        content_type: String,
        /// The requested field id.
        field: String,
    },

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }
}
