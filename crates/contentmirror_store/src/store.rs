//! The store contract shared by every backend.

use crate::error::StoreResult;
use crate::query::{Query, QueryOptions, QueryResult, QuerySpec};
use contentmirror_core::{Config, ContentTypeRegistry, Record};
use serde_json::Value;
use tracing::warn;

/// A persistence backend for records.
///
/// Lookups that find nothing return `Ok(None)` or an empty result, never an
/// error. Implementations are shared across threads.
pub trait ContentStore: Send + Sync {
    /// Short backend name used in errors and logs.
    fn backend_name(&self) -> &'static str;

    /// Returns the configuration used to normalize queries.
    fn config(&self) -> &Config;

    /// Returns the schema used to validate field names, if any.
    fn registry(&self) -> Option<&ContentTypeRegistry> {
        None
    }

    /// Looks up a record by id.
    fn find(&self, id: &str) -> StoreResult<Option<Record>>;

    /// Stores `record` under `id` unconditionally. Returns the record replaced.
    fn set(&self, id: &str, record: Record) -> StoreResult<Option<Record>>;

    /// Removes a record. Returns the removed record.
    fn delete(&self, id: &str) -> StoreResult<Option<Record>>;

    /// Applies a record coming from the sync stream.
    ///
    /// Writes that would lower the stored revision are rejected and the
    /// current record is returned. Deletions remove the record and return
    /// `None`.
    fn index(&self, record: Record) -> StoreResult<Option<Record>>;

    /// Whether `index` is available.
    fn supports_indexing(&self) -> bool;

    /// Runs a query.
    fn execute(&self, spec: &QuerySpec) -> StoreResult<QueryResult>;
}

/// Query entry points available on every store.
pub trait StoreExt: ContentStore {
    /// Starts a query over one content type with default options.
    fn find_all(&self, content_type: &str) -> Query<'_, Self> {
        Query::new(self, content_type, QueryOptions::default())
    }

    /// Starts a query with explicit options.
    fn find_all_with(&self, content_type: &str, options: QueryOptions) -> StoreResult<Query<'_, Self>> {
        Query::with_options(self, content_type, options)
    }

    /// Returns the first record of `content_type` matching a JSON filter.
    ///
    /// The filter may carry an `options` key.
    fn find_by(&self, content_type: &str, filter: &Value) -> StoreResult<Option<Record>> {
        Query::from_filter(self, content_type, filter)?.first()
    }
}

impl<S: ContentStore + ?Sized> StoreExt for S {}

/// Anything that can hand out records by id.
///
/// Implemented by every store and by the records stitched into a query result.
pub trait RecordLookup {
    /// Looks up a record by id.
    fn lookup(&self, id: &str) -> StoreResult<Option<Record>>;
}

impl<S: ContentStore + ?Sized> RecordLookup for S {
    fn lookup(&self, id: &str) -> StoreResult<Option<Record>> {
        self.find(id)
    }
}

/// Outcome of comparing an incoming record against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionDecision {
    /// The incoming record is applied.
    Apply,
    /// The incoming record is older than the stored one.
    Reject,
}

/// Decides whether `incoming` may replace `existing`.
///
/// Only a strictly lower revision is rejected; equal revisions are applied
/// so the latest write wins. Records without a revision always apply.
pub fn revision_gate(existing: Option<&Record>, incoming: &Record) -> RevisionDecision {
    match (existing.and_then(Record::revision), incoming.revision()) {
        (Some(current), Some(next)) if next < current => RevisionDecision::Reject,
        _ => RevisionDecision::Apply,
    }
}

/// Runs the shared `index` flow against backend primitives.
///
/// `put` writes a record, `remove` deletes one. Callers hold their write lock
/// around this so the read-compare-write is atomic.
pub(crate) fn apply_indexed<P, R>(
    backend: &str,
    existing: Option<Record>,
    incoming: Record,
    put: P,
    remove: R,
) -> StoreResult<(RevisionDecision, Option<Record>)>
where
    P: FnOnce(&Record) -> StoreResult<()>,
    R: FnOnce(&str) -> StoreResult<()>,
{
    match revision_gate(existing.as_ref(), &incoming) {
        RevisionDecision::Reject => {
            warn!(
                backend,
                id = incoming.id(),
                stored = ?existing.as_ref().and_then(Record::revision),
                incoming = ?incoming.revision(),
                "rejected write with lower revision"
            );
            if let Some(current) = &existing {
                put(current)?;
            }
            Ok((RevisionDecision::Reject, existing))
        }
        RevisionDecision::Apply if incoming.is_deletion() => {
            remove(incoming.id())?;
            Ok((RevisionDecision::Apply, None))
        }
        RevisionDecision::Apply => {
            put(&incoming)?;
            Ok((RevisionDecision::Apply, Some(incoming)))
        }
    }
}
