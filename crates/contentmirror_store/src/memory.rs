//! In-memory store.

use crate::error::StoreResult;
use crate::include::collect_includes;
use crate::query::{Condition, QueryResult, QuerySpec, Scope, Segment};
use crate::stats::StoreStats;
use crate::store::{apply_indexed, ContentStore, RevisionDecision};
use contentmirror_core::{Config, ContentTypeRegistry, Link, Record};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// A store holding every record in a map.
///
/// Supports every operator, link hops and locale fallback. Suitable for
/// tests and for mirrors small enough to keep in memory.
///
/// # Example
///
/// ```rust
/// use contentmirror_core::{Config, Record};
/// use contentmirror_store::{ContentStore, MemoryStore, StoreExt};
///
/// let store = MemoryStore::new(Config::default());
/// store.index(Record::entry("e1", "page").with_field("slug", "en-US", "/about")).unwrap();
///
/// let page = store.find_all("page").eq("slug", "/about").unwrap().first().unwrap();
/// assert_eq!(page.map(|p| p.id().to_string()), Some("e1".to_string()));
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    config: Config,
    registry: Option<ContentTypeRegistry>,
    records: RwLock<HashMap<String, Record>>,
    stats: StoreStats,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: None,
            records: RwLock::new(HashMap::new()),
            stats: StoreStats::new(),
        }
    }

    /// Validates query field names against `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: ContentTypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Returns the number of stored records, including sync tokens.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns every stored record, ordered by id.
    pub fn records(&self) -> Vec<Record> {
        let mut all: Vec<Record> = self.records.read().values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }
}

impl ContentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn registry(&self) -> Option<&ContentTypeRegistry> {
        self.registry.as_ref()
    }

    fn find(&self, id: &str) -> StoreResult<Option<Record>> {
        self.stats.record_find();
        Ok(self.records.read().get(id).cloned())
    }

    fn set(&self, id: &str, record: Record) -> StoreResult<Option<Record>> {
        self.stats.record_write();
        Ok(self.records.write().insert(id.to_string(), record))
    }

    fn delete(&self, id: &str) -> StoreResult<Option<Record>> {
        self.stats.record_delete();
        Ok(self.records.write().remove(id))
    }

    fn index(&self, record: Record) -> StoreResult<Option<Record>> {
        let mut records = self.records.write();
        let existing = records.get(record.id()).cloned();
        let mut staged: Option<Record> = None;
        let mut removed: Option<String> = None;

        let (decision, result) = apply_indexed(
            self.backend_name(),
            existing,
            record,
            |r| {
                staged = Some(r.clone());
                Ok(())
            },
            |id| {
                removed = Some(id.to_string());
                Ok(())
            },
        )?;

        match decision {
            RevisionDecision::Reject => self.stats.record_rejected_write(),
            RevisionDecision::Apply if removed.is_some() => self.stats.record_delete(),
            RevisionDecision::Apply => self.stats.record_write(),
        }
        if let Some(r) = staged {
            records.insert(r.id().to_string(), r);
        }
        if let Some(id) = removed {
            records.remove(&id);
        }
        Ok(result)
    }

    fn supports_indexing(&self) -> bool {
        true
    }

    fn execute(&self, spec: &QuerySpec) -> StoreResult<QueryResult> {
        self.stats.record_query();
        let records = self.records.read();

        let mut matches: Vec<&Record> = records
            .values()
            .filter(|r| !r.is_deletion() && r.content_type_id() == Some(spec.content_type.as_str()))
            .filter(|r| {
                spec.conditions
                    .iter()
                    .all(|c| matches_condition(r, c, &|id| records.get(id)))
            })
            .collect();
        matches.sort_by(|a, b| a.id().cmp(b.id()));

        let total = matches.len();
        let items: Vec<Record> = matches
            .into_iter()
            .skip(spec.options.skip)
            .take(spec.options.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        let included = collect_includes(&items, spec.options.include, |ids| {
            Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
        })?;

        debug!(
            content_type = %spec.content_type,
            conditions = spec.conditions.len(),
            total,
            returned = items.len(),
            "memory query"
        );
        Ok(QueryResult {
            items,
            included,
            total,
        })
    }
}

/// Evaluates one condition, following a link hop through `lookup`.
pub(crate) fn matches_condition<'a>(
    record: &'a Record,
    condition: &Condition,
    lookup: &dyn Fn(&str) -> Option<&'a Record>,
) -> bool {
    let path = condition.path();
    let candidates = match path.joined() {
        None => values_at(record, path.head()),
        Some(joined) => {
            let links = link_targets(record, path.head());
            if joined.is_sys_id() {
                links.into_iter().map(|l| Value::String(l.id)).collect()
            } else {
                links
                    .iter()
                    .filter_map(|l| lookup(&l.id))
                    .flat_map(|target| values_at(target, joined))
                    .collect()
            }
        }
    };
    condition.test(&candidates)
}

/// Returns the values at one path group. Arrays are flattened.
pub(crate) fn values_at(record: &Record, segment: &Segment) -> Vec<Value> {
    let value = match segment.scope {
        Scope::Sys => sys_value(record, &segment.name),
        Scope::Fields => record.field(&segment.name, &segment.locales).cloned(),
    };
    match value {
        Some(Value::Array(items)) => items.into_iter().filter(|v| !v.is_null()).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

fn link_targets(record: &Record, segment: &Segment) -> Vec<Link> {
    let mut links = Vec::new();
    if let Some(value) = record.field(&segment.name, &segment.locales) {
        contentmirror_core::collect_links(value, &mut links);
    }
    links
}

fn sys_value(record: &Record, attribute: &str) -> Option<Value> {
    let sys = &record.sys;
    match attribute {
        "id" => Some(Value::String(sys.id.clone())),
        "type" => Some(Value::String(sys.kind.as_str().to_string())),
        "revision" => sys.revision.map(Value::from),
        "contentType" => record.content_type_id().map(Value::from),
        "locale" => sys.locale.clone().map(Value::String),
        "createdAt" => sys.created_at.clone().map(Value::String),
        "updatedAt" => sys.updated_at.clone().map(Value::String),
        _ => None,
    }
}
