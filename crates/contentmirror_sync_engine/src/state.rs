//! Sync engine state and statistics.

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No call in progress.
    #[default]
    Idle,
    /// Waiting for a delta page from the source.
    Fetching,
    /// Writing items of a page to the store.
    Applying,
}

impl SyncState {
    /// Returns true while a `next` call is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Fetching | SyncState::Applying)
    }
}

/// Counters over the lifetime of an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Completed `next` calls.
    pub calls: u64,
    /// Items written to the store, deletions included.
    pub items_applied: u64,
    /// Delta pages fetched.
    pub pages_fetched: u64,
    /// Cursor persisted by the last successful call.
    pub last_cursor: Option<String>,
    /// Message of the last failed call, cleared on success.
    pub last_error: Option<String>,
}

/// Result of one `next` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    /// Whether the requested id appeared in the delta stream.
    pub found: bool,
    /// Number of items applied.
    pub applied: usize,
    /// Whether the page cap stopped the call before the stream was drained.
    pub more_pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_checks() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Fetching.is_active());
        assert!(SyncState::Applying.is_active());
        assert_eq!(SyncState::default(), SyncState::Idle);
    }
}
