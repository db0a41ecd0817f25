//! Error types for link resolution.

use contentmirror_store::StoreError;
use thiserror::Error;

/// Result type for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that can occur while resolving links.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A link points back at an ancestor and the policy is
    /// [`CircularPolicy::Raise`](crate::CircularPolicy::Raise).
    #[error("circular reference to {id} via {}", chain.join(" -> "))]
    CircularReference {
        /// The id that closes the cycle.
        id: String,
        /// Ancestor ids, root first.
        chain: Vec<String>,
    },

    /// Looking up a link target failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_reference_display() {
        let err = ResolveError::CircularReference {
            id: "a".into(),
            chain: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "circular reference to a via a -> b");
    }
}
