//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and delta streams that keep
//! the invariants the stores rely on (valid ids, field names and revisions).

use crate::fixtures::{link_to, FIXTURE_LOCALE};
use contentmirror_core::Record;
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for record ids.
fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9][a-zA-Z0-9_-]{0,15}").expect("Invalid regex")
}

/// Strategy for field names accepted in query paths.
fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9_]{0,11}")
        .expect("Invalid regex")
        .prop_filter("reserved", |s| s != "id" && s != "sys" && s != "fields")
}

/// Strategy for scalar field values.
fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(|n| json!(n)),
        prop::string::string_regex("[a-z ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for a published entry of `content_type` with a few scalar fields.
pub fn entry_strategy(content_type: &'static str) -> impl Strategy<Value = Record> {
    (
        record_id_strategy(),
        1u64..50,
        prop::collection::btree_map(field_name_strategy(), scalar_strategy(), 0..5),
    )
        .prop_map(move |(id, revision, fields)| {
            let mut record = Record::entry(id, content_type).with_revision(revision);
            for (name, value) in fields {
                record.set_field(&name, FIXTURE_LOCALE, value);
            }
            record
        })
}

/// One step of a delta stream over a fixed set of ids.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOp {
    /// Publish revision `revision` of `id`.
    Publish {
        /// Record id.
        id: String,
        /// Published revision.
        revision: u64,
    },
    /// Delete `id` at `revision`.
    Delete {
        /// Record id.
        id: String,
        /// Deletion revision.
        revision: u64,
    },
}

impl DeltaOp {
    /// Converts the step into the record the source would send.
    pub fn to_record(&self, content_type: &str) -> Record {
        match self {
            DeltaOp::Publish { id, revision } => Record::entry(id.clone(), content_type)
                .with_revision(*revision)
                .with_field("rev", FIXTURE_LOCALE, *revision),
            DeltaOp::Delete { id, revision } => {
                Record::deleted_entry(id.clone()).with_revision(*revision)
            }
        }
    }
}

/// Strategy for unordered delta streams over `ids` distinct records.
pub fn delta_stream_strategy(ids: usize, len: usize) -> impl Strategy<Value = Vec<DeltaOp>> {
    let op = (0..ids.max(1), 1u64..30, prop::bool::weighted(0.2)).prop_map(|(i, revision, delete)| {
        let id = format!("r{i}");
        if delete {
            DeltaOp::Delete { id, revision }
        } else {
            DeltaOp::Publish { id, revision }
        }
    });
    prop::collection::vec(op, 1..len.max(2))
}

/// Strategy for `node` entries forming an arbitrary link graph (cycles included).
pub fn link_graph_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<Record>> {
    (1..max_nodes.max(2)).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0..n, 0..4), n).prop_map(|edges| {
            edges
                .iter()
                .enumerate()
                .map(|(i, targets)| {
                    let next: Vec<Value> = targets.iter().map(|t| link_to(&format!("g{t}"))).collect();
                    Record::entry(format!("g{i}"), "node")
                        .with_revision(1)
                        .with_field("next", FIXTURE_LOCALE, Value::Array(next))
                })
                .collect()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_core::RecordKind;

    proptest! {
        #[test]
        fn entries_are_well_formed(record in entry_strategy("post")) {
            prop_assert_eq!(record.content_type_id(), Some("post"));
            prop_assert!(record.revision().unwrap_or(0) >= 1);
        }

        #[test]
        fn graph_links_stay_inside(records in link_graph_strategy(6)) {
            let ids: Vec<_> = records.iter().map(|r| r.id().to_string()).collect();
            for record in &records {
                for link in record.links() {
                    prop_assert!(ids.contains(&link.id));
                }
            }
        }

        #[test]
        fn deltas_map_to_records(ops in delta_stream_strategy(3, 10)) {
            for op in ops {
                let record = op.to_record("doc");
                match op {
                    DeltaOp::Publish { .. } => prop_assert_eq!(record.kind(), RecordKind::Entry),
                    DeltaOp::Delete { .. } => prop_assert_eq!(record.kind(), RecordKind::DeletedEntry),
                }
            }
        }
    }
}
