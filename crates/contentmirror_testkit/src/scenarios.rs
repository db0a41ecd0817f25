//! Link graph scenarios for resolver tests.
//!
//! Every node is a `node` entry with a `title` and a `next` array of entry
//! links, so one shape covers chains, cycles and diamonds.

use crate::fixtures::{entry, link_to};
use contentmirror_core::Record;
use serde_json::{json, Value};

/// Builds a node linking to `targets`, in order.
pub fn node(id: &str, targets: &[&str]) -> Record {
    let next: Vec<Value> = targets.iter().map(|t| link_to(t)).collect();
    entry(id, "node", json!({ "title": id.to_uppercase(), "next": next }))
}

/// `a -> b -> a`.
pub fn cyclic_pair() -> Vec<Record> {
    vec![node("a", &["b"]), node("b", &["a"])]
}

/// `a -> {b, c} -> d`.
pub fn diamond() -> Vec<Record> {
    vec![
        node("a", &["b", "c"]),
        node("b", &["d"]),
        node("c", &["d"]),
        node("d", &[]),
    ]
}

/// `n0 -> n1 -> ... -> n{len-1}`.
pub fn chain(len: usize) -> Vec<Record> {
    let ids: Vec<String> = (0..len).map(|i| format!("n{i}")).collect();
    ids.iter()
        .enumerate()
        .map(|(i, id)| match ids.get(i + 1) {
            Some(next) => node(id, &[next.as_str()]),
            None => node(id, &[]),
        })
        .collect()
}

/// A root linking to `width` leaves that all link back to the root.
pub fn fan(width: usize) -> Vec<Record> {
    let leaves: Vec<String> = (0..width).map(|i| format!("leaf{i}")).collect();
    let refs: Vec<&str> = leaves.iter().map(String::as_str).collect();
    let mut records = vec![node("root", &refs)];
    records.extend(leaves.iter().map(|leaf| node(leaf, &["root"])));
    records
}
