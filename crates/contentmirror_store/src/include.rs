//! Bulk stitching of linked records into query results.

use crate::error::StoreResult;
use crate::store::RecordLookup;
use contentmirror_core::Record;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Records returned by a query, plus everything stitched in for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludedRecords {
    records: HashMap<String, Record>,
}

impl IncludedRecords {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, replacing any record with the same id.
    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.id().to_string(), record);
    }

    /// Returns a record by id.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    /// Returns true if `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record is present.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }
}

impl FromIterator<Record> for IncludedRecords {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut included = Self::new();
        for record in iter {
            included.insert(record);
        }
        included
    }
}

impl RecordLookup for IncludedRecords {
    fn lookup(&self, id: &str) -> StoreResult<Option<Record>> {
        Ok(self.records.get(id).cloned())
    }
}

/// Collects `items` and everything they link to, up to `depth` levels.
///
/// Each level issues one `fetch_many` call with every id not seen yet, so the
/// number of backend round trips is bounded by `depth`, not by link count.
pub(crate) fn collect_includes<F>(
    items: &[Record],
    depth: usize,
    mut fetch_many: F,
) -> StoreResult<IncludedRecords>
where
    F: FnMut(&[String]) -> StoreResult<Vec<Record>>,
{
    let mut included: IncludedRecords = items.iter().cloned().collect();
    let mut seen: HashSet<String> = items.iter().map(|r| r.id().to_string()).collect();
    let mut frontier = unseen_links(items.iter(), &mut seen);

    for level in 0..depth {
        if frontier.is_empty() {
            break;
        }
        trace!(level, ids = frontier.len(), "fetching included records");
        let fetched = fetch_many(&frontier)?;
        frontier = unseen_links(fetched.iter(), &mut seen);
        for record in fetched {
            included.insert(record);
        }
    }
    Ok(included)
}

fn unseen_links<'a>(
    records: impl Iterator<Item = &'a Record>,
    seen: &mut HashSet<String>,
) -> Vec<String> {
    let mut ids = Vec::new();
    for record in records {
        for link in record.links() {
            if seen.insert(link.id.clone()) {
                ids.push(link.id);
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_core::Link;

    fn chain() -> HashMap<String, Record> {
        let c = Record::entry("c", "node");
        let b = Record::entry("b", "node").with_field("next", "en-US", Link::entry("c"));
        [b, c].into_iter().map(|r| (r.id().to_string(), r)).collect()
    }

    #[test]
    fn one_fetch_per_level() {
        let store = chain();
        let root = Record::entry("a", "node").with_field("next", "en-US", Link::entry("b"));
        let mut calls = Vec::new();

        let included = collect_includes(&[root], 5, |ids| {
            calls.push(ids.to_vec());
            Ok(ids.iter().filter_map(|id| store.get(id).cloned()).collect())
        })
        .unwrap();

        assert_eq!(calls, vec![vec!["b".to_string()], vec!["c".to_string()]]);
        assert_eq!(included.len(), 3);
        assert!(included.lookup("c").unwrap().is_some());
    }

    #[test]
    fn depth_bounds_levels() {
        let store = chain();
        let root = Record::entry("a", "node").with_field("next", "en-US", Link::entry("b"));
        let included = collect_includes(&[root], 1, |ids| {
            Ok(ids.iter().filter_map(|id| store.get(id).cloned()).collect())
        })
        .unwrap();
        assert!(included.contains("b"));
        assert!(!included.contains("c"));
    }

    #[test]
    fn zero_depth_fetches_nothing() {
        let root = Record::entry("a", "node").with_field("next", "en-US", Link::entry("b"));
        let included = collect_includes(&[root], 0, |_| panic!("no fetch expected")).unwrap();
        assert_eq!(included.len(), 1);
    }
}
