//! Error types for remote content sources.

use std::time::Duration;
use thiserror::Error;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised by a [`crate::ContentSource`].
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the caller may retry.
        retryable: bool,
    },

    /// The rate-limit backoff budget was used up.
    #[error("rate limit exceeded after waiting {waited:?}")]
    RateLimitExceeded {
        /// Total time spent waiting before giving up.
        waited: Duration,
    },

    /// A collection endpoint does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// Requested path.
        path: String,
    },

    /// The response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record in the response was invalid.
    #[error("invalid record: {0}")]
    Record(#[from] contentmirror_core::CoreError),
}

impl SourceError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if rescheduling the call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport { retryable, .. } => *retryable,
            SourceError::RateLimitExceeded { .. } => true,
            _ => false,
        }
    }
}
