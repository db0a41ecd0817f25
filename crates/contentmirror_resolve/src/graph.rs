//! Arena of resolved records.
//!
//! Nodes are keyed by record id and refer to each other by id, so a cycle in
//! the content graph is just two ids naming each other. Every link to the
//! same id within one resolution lands on the same node.

use contentmirror_core::{Link, Record};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A field value after resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A plain value.
    Value(Value),
    /// A link left unresolved (depth exhausted, missing target, or ignored cycle).
    Link(Link),
    /// A link resolved to the node with this id.
    Record(String),
    /// An array of resolved values.
    Array(Vec<Resolved>),
}

impl Resolved {
    /// Converts a raw field value, turning link objects into [`Resolved::Link`].
    pub(crate) fn from_raw(value: &Value) -> Self {
        if let Some(link) = Link::from_value(value) {
            return Resolved::Link(link);
        }
        match value {
            Value::Array(items) => Resolved::Array(items.iter().map(Resolved::from_raw).collect()),
            other => Resolved::Value(other.clone()),
        }
    }

    /// Returns the plain value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the unresolved link, if this is one.
    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Resolved::Link(link) => Some(link),
            _ => None,
        }
    }
}

/// One record in the arena.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedNode {
    pub(crate) record: Record,
    pub(crate) fields: BTreeMap<String, Resolved>,
    /// Deepest expansion applied so far.
    pub(crate) expanded_depth: usize,
}

impl ResolvedNode {
    pub(crate) fn new(record: Record, locales: &[String]) -> Self {
        let fields = record
            .fields
            .keys()
            .filter_map(|name| {
                record
                    .field(name, locales)
                    .map(|value| (name.clone(), Resolved::from_raw(value)))
            })
            .collect();
        Self {
            record,
            fields,
            expanded_depth: 0,
        }
    }
}

/// The result of resolving one root record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGraph {
    pub(crate) root: String,
    pub(crate) nodes: HashMap<String, ResolvedNode>,
    pub(crate) lookups: usize,
}

impl ResolvedGraph {
    /// Returns a view of the root record.
    pub fn root(&self) -> EntryView<'_> {
        EntryView {
            graph: self,
            id: &self.root,
        }
    }

    /// Returns a view of any record in the graph.
    pub fn get(&self, id: &str) -> Option<EntryView<'_>> {
        self.nodes
            .get_key_value(id)
            .map(|(id, _)| EntryView { graph: self, id })
    }

    /// Returns true if `id` was materialized.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns the number of materialized records, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph holds no records.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of lookups performed to build the graph.
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    fn node(&self, id: &str) -> Option<&ResolvedNode> {
        self.nodes.get(id)
    }
}

/// A borrowed view of one resolved record.
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'g> {
    graph: &'g ResolvedGraph,
    id: &'g str,
}

impl<'g> EntryView<'g> {
    /// Returns the record id.
    pub fn id(&self) -> &'g str {
        self.id
    }

    /// Returns the underlying record, unchanged by resolution.
    pub fn record(&self) -> &'g Record {
        &self.node().record
    }

    /// Returns a resolved field.
    pub fn field(&self, name: &str) -> Option<&'g Resolved> {
        self.node().fields.get(name)
    }

    /// Iterates over the resolved fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&'g str, &'g Resolved)> {
        self.node().fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Follows a single resolved link.
    pub fn linked(&self, name: &str) -> Option<EntryView<'g>> {
        match self.field(name)? {
            Resolved::Record(id) => self.graph.get(id),
            _ => None,
        }
    }

    /// Follows every resolved link in an array field. Unresolved items are skipped.
    pub fn linked_all(&self, name: &str) -> Vec<EntryView<'g>> {
        match self.field(name) {
            Some(Resolved::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Resolved::Record(id) => self.graph.get(id),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if both views point at the same materialized record.
    pub fn ptr_eq(&self, other: &EntryView<'_>) -> bool {
        std::ptr::eq(self.node(), other.node())
    }

    /// Rebuilds a JSON tree with resolved records inlined.
    ///
    /// A record that already appears on the path from the root is emitted as
    /// a link, so cyclic graphs serialize finitely.
    pub fn to_json(&self) -> Value {
        let mut path = HashSet::new();
        self.to_json_inner(&mut path)
    }

    fn to_json_inner(&self, path: &mut HashSet<&'g str>) -> Value {
        path.insert(self.id);
        let fields: Map<String, Value> = self
            .fields()
            .map(|(name, value)| (name.to_string(), self.value_json(value, path)))
            .collect();
        path.remove(self.id);

        let mut object = Map::new();
        object.insert(
            "sys".to_string(),
            serde_json::to_value(&self.record().sys).unwrap_or(Value::Null),
        );
        object.insert("fields".to_string(), Value::Object(fields));
        Value::Object(object)
    }

    fn value_json(&self, value: &'g Resolved, path: &mut HashSet<&'g str>) -> Value {
        match value {
            Resolved::Value(v) => v.clone(),
            Resolved::Link(link) => link.to_value(),
            Resolved::Array(items) => {
                Value::Array(items.iter().map(|i| self.value_json(i, path)).collect())
            }
            Resolved::Record(id) => match self.graph.get(id) {
                Some(view) if !path.contains(view.id) => view.to_json_inner(path),
                Some(view) => back_edge(view.record()),
                None => Value::Null,
            },
        }
    }

    fn node(&self) -> &'g ResolvedNode {
        // Views are only created for ids present in the arena.
        &self.graph.nodes[self.id]
    }
}

fn back_edge(record: &Record) -> Value {
    let link = match record.kind() {
        contentmirror_core::RecordKind::Asset => Link::asset(record.id()),
        _ => Link::entry(record.id()),
    };
    link.to_value()
}

impl PartialEq for EntryView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
