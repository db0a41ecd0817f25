//! Resolution over generated link graphs.

use contentmirror_core::Record;
use contentmirror_resolve::{CircularPolicy, LinkResolver, ResolveOptions, Resolved, ResolvedGraph};
use contentmirror_store::{ContentStore, MemoryStore};
use contentmirror_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;

fn root_of(store: &MemoryStore, id: &str) -> Record {
    store.find(id).unwrap().unwrap()
}

/// Adjacency list of a generated graph, indexed by the number in `g{i}`.
fn edges_of(records: &[Record]) -> Vec<Vec<usize>> {
    records
        .iter()
        .map(|r| {
            r.links()
                .iter()
                .map(|l| l.id.trim_start_matches('g').parse().unwrap())
                .collect()
        })
        .collect()
}

/// Every resolved reference points at a node in the arena.
fn check_closed(graph: &ResolvedGraph, value: &Resolved) {
    match value {
        Resolved::Record(id) => assert!(graph.contains(id)),
        Resolved::Array(items) => items.iter().for_each(|i| check_closed(graph, i)),
        Resolved::Value(_) | Resolved::Link(_) => {}
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_graph_terminates_with_one_lookup_per_id(
        records in link_graph_strategy(8),
        depth in 0usize..12,
    ) {
        let n = records.len();
        let store = seeded_memory_store(records);
        let root = root_of(&store, "g0");
        let finds_before = store.stats().finds();

        let resolver = LinkResolver::new(&store, fixture_locales());
        let graph = resolver.resolve(&root, depth).unwrap();

        let lookups = (store.stats().finds() - finds_before) as usize;
        prop_assert_eq!(lookups, graph.lookups());
        prop_assert!(lookups < n);
        prop_assert!(graph.len() <= n);

        let mut ids = HashSet::new();
        for i in 0..n {
            if let Some(view) = graph.get(&format!("g{i}")) {
                ids.insert(view.id().to_string());
                for (_, value) in view.fields() {
                    check_closed(&graph, value);
                }
            }
        }
        prop_assert_eq!(ids.len(), graph.len());

        // Serialization always terminates, even for cyclic graphs.
        let json = graph.root().to_json();
        prop_assert_eq!(&json["sys"]["id"], "g0");
    }

    #[test]
    fn raise_only_fails_on_real_cycles(records in link_graph_strategy(8)) {
        let edges = edges_of(&records);
        let store = seeded_memory_store(records);
        let root = root_of(&store, "g0");
        let resolver = LinkResolver::new(&store, fixture_locales());
        let options = ResolveOptions::new(edges.len() + 1).with_circular(CircularPolicy::Raise);

        let reaches_cycle = has_reachable_cycle(&edges);
        match resolver.resolve_with(&root, &options) {
            Ok(_) => prop_assert!(!reaches_cycle),
            Err(err) => {
                prop_assert!(reaches_cycle, "unexpected error {}", err);
            }
        }
    }
}

fn has_reachable_cycle(edges: &[Vec<usize>]) -> bool {
    fn dfs(node: usize, edges: &[Vec<usize>], on_path: &mut Vec<bool>, done: &mut Vec<bool>) -> bool {
        if on_path[node] {
            return true;
        }
        if done[node] {
            return false;
        }
        on_path[node] = true;
        let found = edges[node].iter().any(|&next| dfs(next, edges, on_path, done));
        on_path[node] = false;
        done[node] = true;
        found
    }
    let mut on_path = vec![false; edges.len()];
    let mut done = vec![false; edges.len()];
    dfs(0, edges, &mut on_path, &mut done)
}

#[test]
fn self_link_at_any_depth() {
    let store = seeded_memory_store([node("a", &["a"])]);
    let resolver = LinkResolver::new(&store, fixture_locales());
    let graph = resolver.resolve(&root_of(&store, "a"), 99).unwrap();

    let view = graph.root();
    let again = view.linked_all("next");
    assert_eq!(again.len(), 1);
    assert!(again[0].ptr_eq(&view));
    assert_eq!(graph.lookups(), 0);
}

#[test]
fn cyclic_pair_returns_to_root() {
    let store = seeded_memory_store(cyclic_pair());
    let resolver = LinkResolver::new(&store, fixture_locales());
    let graph = resolver.resolve(&root_of(&store, "a"), 99).unwrap();

    let root = graph.root();
    let b = &root.linked_all("next")[0];
    assert_eq!(b.id(), "b");
    assert!(b.linked_all("next")[0].ptr_eq(&root));
    assert_eq!(graph.lookups(), 1);

    let options = ResolveOptions::new(99).with_circular(CircularPolicy::Raise);
    assert!(resolver.resolve_with(&root_of(&store, "a"), &options).is_err());
}

#[test]
fn diamond_shares_the_leaf() {
    let store = seeded_memory_store(diamond());
    let resolver = LinkResolver::new(&store, fixture_locales());
    let graph = resolver.resolve(&root_of(&store, "a"), 3).unwrap();

    let middle = graph.root().linked_all("next");
    let via_b = &middle[0].linked_all("next")[0];
    let via_c = &middle[1].linked_all("next")[0];
    assert_eq!(via_b.id(), "d");
    assert!(via_b.ptr_eq(via_c));
    assert_eq!(graph.lookups(), 3);
}

#[test]
fn deeper_second_visit_expands_further() {
    // a -> b -> c -> d and a -> c directly.
    let store = seeded_memory_store([
        node("a", &["b", "c"]),
        node("b", &["c"]),
        node("c", &["d"]),
        node("d", &[]),
    ]);
    let resolver = LinkResolver::new(&store, fixture_locales());
    let graph = resolver.resolve(&root_of(&store, "a"), 2).unwrap();

    // c is one hop from the root, so its own links are resolved one level.
    let c = graph.get("c").unwrap();
    assert_eq!(c.linked_all("next")[0].id(), "d");
    assert_eq!(graph.lookups(), 3);
}
