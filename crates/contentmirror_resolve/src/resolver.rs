//! Depth-bounded link resolution.

use crate::error::{ResolveError, ResolveResult};
use crate::graph::{EntryView, Resolved, ResolvedGraph, ResolvedNode};
use crate::options::{CircularPolicy, ResolveOptions};
use contentmirror_core::{Link, LocaleConfig, Record};
use contentmirror_store::{QueryResult, RecordLookup};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Resolves links of records against a [`RecordLookup`].
///
/// # Example
///
/// ```rust
/// use contentmirror_core::{Config, Link, Record};
/// use contentmirror_resolve::LinkResolver;
/// use contentmirror_store::{ContentStore, MemoryStore};
///
/// let store = MemoryStore::new(Config::default());
/// store.index(Record::entry("b", "node").with_field("title", "en-US", "B")).unwrap();
/// let a = Record::entry("a", "node").with_field("next", "en-US", Link::entry("b"));
///
/// let resolver = LinkResolver::new(&store, store.config().locales.clone());
/// let graph = resolver.resolve(&a, 1).unwrap();
/// let b = graph.root().linked("next").unwrap();
/// assert_eq!(b.id(), "b");
/// ```
pub struct LinkResolver<'l, L: RecordLookup + ?Sized> {
    lookup: &'l L,
    locales: LocaleConfig,
}

impl<'l, L: RecordLookup + ?Sized> LinkResolver<'l, L> {
    /// Creates a resolver reading through `lookup`.
    pub fn new(lookup: &'l L, locales: LocaleConfig) -> Self {
        Self { lookup, locales }
    }

    /// Resolves `root` to `depth` levels with default options.
    pub fn resolve(&self, root: &Record, depth: usize) -> ResolveResult<ResolvedGraph> {
        self.resolve_with(root, &ResolveOptions::new(depth))
    }

    /// Resolves `root` with explicit options.
    pub fn resolve_with(&self, root: &Record, options: &ResolveOptions) -> ResolveResult<ResolvedGraph> {
        let locale = options
            .locale
            .as_deref()
            .unwrap_or(&self.locales.default_locale);
        let mut run = Resolution {
            lookup: self.lookup,
            policy: options.circular,
            locales: self.locales.fallback_chain(locale),
            nodes: HashMap::new(),
            missing: HashSet::new(),
            lookups: 0,
        };

        let mut backlinks = Vec::with_capacity(options.backlinks.len() + options.depth.min(16));
        for ancestor in &options.backlinks {
            if ancestor.id() != root.id() {
                run.insert(ancestor.clone());
                backlinks.push(ancestor.id().to_string());
            }
        }
        run.insert(root.clone());
        run.expand(root.id(), options.depth, options.fields.as_deref(), &mut backlinks)?;

        debug!(
            root = root.id(),
            depth = options.depth,
            nodes = run.nodes.len(),
            lookups = run.lookups,
            "resolved links"
        );
        Ok(ResolvedGraph {
            root: root.id().to_string(),
            nodes: run.nodes,
            lookups: run.lookups,
        })
    }
}

/// State of one resolution call.
struct Resolution<'l, L: RecordLookup + ?Sized> {
    lookup: &'l L,
    policy: CircularPolicy,
    locales: Vec<String>,
    nodes: HashMap<String, ResolvedNode>,
    /// Ids already looked up and not found.
    missing: HashSet<String>,
    lookups: usize,
}

impl<L: RecordLookup + ?Sized> Resolution<'_, L> {
    fn insert(&mut self, record: Record) {
        let id = record.id().to_string();
        let node = ResolvedNode::new(record, &self.locales);
        self.nodes.entry(id).or_insert(node);
    }

    /// Resolves the links of node `id` to `depth` levels.
    fn expand(
        &mut self,
        id: &str,
        depth: usize,
        only: Option<&[String]>,
        backlinks: &mut Vec<String>,
    ) -> ResolveResult<()> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(());
        };
        if depth == 0 || node.expanded_depth >= depth {
            return Ok(());
        }
        node.expanded_depth = depth;
        let mut fields = std::mem::take(&mut node.fields);

        backlinks.push(id.to_string());
        let mut outcome = Ok(());
        for (name, value) in fields.iter_mut() {
            if only.is_some_and(|names| !names.iter().any(|n| n == name)) {
                continue;
            }
            if let Err(err) = self.resolve_value(value, depth, backlinks) {
                outcome = Err(err);
                break;
            }
        }
        backlinks.pop();

        if let Some(node) = self.nodes.get_mut(id) {
            node.fields = fields;
        }
        outcome
    }

    fn resolve_value(
        &mut self,
        value: &mut Resolved,
        depth: usize,
        backlinks: &mut Vec<String>,
    ) -> ResolveResult<()> {
        match value {
            Resolved::Value(_) => Ok(()),
            Resolved::Array(items) => {
                for item in items {
                    self.resolve_value(item, depth, backlinks)?;
                }
                Ok(())
            }
            Resolved::Record(id) => {
                if !backlinks.iter().any(|b| b == id) {
                    let id = id.clone();
                    self.expand(&id, depth - 1, None, backlinks)?;
                }
                Ok(())
            }
            Resolved::Link(link) => {
                if let Some(resolved) = self.resolve_link(link, depth, backlinks)? {
                    *value = resolved;
                }
                Ok(())
            }
        }
    }

    /// Returns the replacement for `link`, or `None` to leave it unresolved.
    fn resolve_link(
        &mut self,
        link: &Link,
        depth: usize,
        backlinks: &mut Vec<String>,
    ) -> ResolveResult<Option<Resolved>> {
        if backlinks.iter().any(|b| *b == link.id) {
            trace!(id = %link.id, policy = ?self.policy, "back-edge");
            return match self.policy {
                CircularPolicy::Reuse => Ok(Some(Resolved::Record(link.id.clone()))),
                CircularPolicy::Ignore => Ok(None),
                CircularPolicy::Raise => Err(ResolveError::CircularReference {
                    id: link.id.clone(),
                    chain: backlinks.clone(),
                }),
            };
        }

        if !self.nodes.contains_key(&link.id) {
            if self.missing.contains(&link.id) {
                return Ok(None);
            }
            self.lookups += 1;
            match self.lookup.lookup(&link.id)? {
                Some(record) if !record.is_deletion() => self.insert(record),
                _ => {
                    trace!(id = %link.id, "link target not found");
                    self.missing.insert(link.id.clone());
                    return Ok(None);
                }
            }
        }

        self.expand(&link.id, depth - 1, None, backlinks)?;
        Ok(Some(Resolved::Record(link.id.clone())))
    }
}

/// Something whose links can be resolved.
pub trait Resolvable {
    /// Resolves with explicit options.
    fn resolve_with<L: RecordLookup + ?Sized>(
        &self,
        resolver: &LinkResolver<'_, L>,
        options: &ResolveOptions,
    ) -> ResolveResult<ResolvedGraph>;

    /// Resolves `depth` levels with default options.
    fn resolve<L: RecordLookup + ?Sized>(
        &self,
        resolver: &LinkResolver<'_, L>,
        depth: usize,
    ) -> ResolveResult<ResolvedGraph> {
        self.resolve_with(resolver, &ResolveOptions::new(depth))
    }
}

impl Resolvable for Record {
    fn resolve_with<L: RecordLookup + ?Sized>(
        &self,
        resolver: &LinkResolver<'_, L>,
        options: &ResolveOptions,
    ) -> ResolveResult<ResolvedGraph> {
        resolver.resolve_with(self, options)
    }
}

impl Resolvable for EntryView<'_> {
    fn resolve_with<L: RecordLookup + ?Sized>(
        &self,
        resolver: &LinkResolver<'_, L>,
        options: &ResolveOptions,
    ) -> ResolveResult<ResolvedGraph> {
        resolver.resolve_with(self.record(), options)
    }
}

/// Resolution of query results against the records stitched into them.
pub trait ResolveIncluded {
    /// Resolves every item to `depth` levels without touching the store.
    ///
    /// Links to records outside the included set stay unresolved.
    fn resolve_items(&self, locales: &LocaleConfig, depth: usize) -> ResolveResult<Vec<ResolvedGraph>>;
}

impl ResolveIncluded for QueryResult {
    fn resolve_items(&self, locales: &LocaleConfig, depth: usize) -> ResolveResult<Vec<ResolvedGraph>> {
        let resolver = LinkResolver::new(&self.included, locales.clone());
        self.items
            .iter()
            .map(|item| resolver.resolve(item, depth))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_core::Config;
    use contentmirror_store::{ContentStore, MemoryStore, StoreExt};
    use serde_json::json;

    fn store(records: Vec<Record>) -> MemoryStore {
        let store = MemoryStore::new(Config::default());
        for record in records {
            store.index(record).unwrap();
        }
        store
    }

    fn node(id: &str, links: &[&str]) -> Record {
        let mut record = Record::entry(id, "node").with_field("title", "en-US", id.to_uppercase());
        if let [single] = links {
            record = record.with_field("next", "en-US", Link::entry(*single));
        } else if !links.is_empty() {
            let values: Vec<_> = links.iter().map(|l| Link::entry(*l).to_value()).collect();
            record = record.with_field("children", "en-US", json!(values));
        }
        record
    }

    fn resolver(store: &MemoryStore) -> LinkResolver<'_, MemoryStore> {
        LinkResolver::new(store, LocaleConfig::default())
    }

    #[test]
    fn no_links_is_a_no_op() {
        let store = store(vec![]);
        let root = node("a", &[]);
        let graph = resolver(&store).resolve(&root, 5).unwrap();
        assert_eq!(graph.root().record(), &root);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.lookups(), 0);
    }

    #[test]
    fn two_node_cycle_reuses_ancestor() {
        let store = store(vec![node("a", &["b"]), node("b", &["a"])]);
        let a = store.find("a").unwrap().unwrap();
        let graph = resolver(&store).resolve(&a, 99).unwrap();

        let root = graph.root();
        let back = root.linked("next").unwrap().linked("next").unwrap();
        assert!(back.ptr_eq(&root));
        assert_eq!(graph.lookups(), 1);
    }

    #[test]
    fn raise_policy_reports_chain() {
        let store = store(vec![node("a", &["b"]), node("b", &["a"])]);
        let a = store.find("a").unwrap().unwrap();
        let options = ResolveOptions::new(3).with_circular(CircularPolicy::Raise);
        match resolver(&store).resolve_with(&a, &options) {
            Err(ResolveError::CircularReference { id, chain }) => {
                assert_eq!(id, "a");
                assert_eq!(chain, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected circular reference, got {other:?}"),
        }
    }

    #[test]
    fn ignore_policy_leaves_link() {
        let store = store(vec![node("a", &["b"]), node("b", &["a"])]);
        let a = store.find("a").unwrap().unwrap();
        let options = ResolveOptions::new(3).with_circular(CircularPolicy::Ignore);
        let graph = resolver(&store).resolve_with(&a, &options).unwrap();
        let b = graph.root().linked("next").unwrap();
        assert_eq!(b.field("next").and_then(Resolved::as_link), Some(&Link::entry("a")));
    }

    #[test]
    fn diamond_shares_one_node() {
        let store = store(vec![
            node("b", &["d"]),
            node("c", &["d"]),
            node("d", &[]),
        ]);
        let root = node("a", &["b", "c"]);
        let graph = resolver(&store).resolve(&root, 3).unwrap();

        let children = graph.root().linked_all("children");
        let via_b = children[0].linked("next").unwrap();
        let via_c = children[1].linked("next").unwrap();
        assert!(via_b.ptr_eq(&via_c));
        assert_eq!(graph.lookups(), 3);
        assert_eq!(store.stats().finds(), 3);
    }

    #[test]
    fn depth_bounds_expansion() {
        let store = store(vec![node("b", &["c"]), node("c", &["d"]), node("d", &[])]);
        let root = node("a", &["b"]);
        let graph = resolver(&store).resolve(&root, 1).unwrap();
        let b = graph.root().linked("next").unwrap();
        assert_eq!(b.field("next").and_then(Resolved::as_link), Some(&Link::entry("c")));
        assert!(!graph.contains("c"));
    }

    #[test]
    fn missing_targets_stay_links() {
        let store = store(vec![]);
        let root = node("a", &["ghost"]);
        let graph = resolver(&store).resolve(&root, 2).unwrap();
        assert_eq!(
            graph.root().field("next").and_then(Resolved::as_link),
            Some(&Link::entry("ghost"))
        );
    }

    #[test]
    fn field_subset_and_locale() {
        let store = store(vec![node("b", &[])]);
        let root = Record::entry("a", "node")
            .with_field("title", "de-DE", "Titel")
            .with_field("title", "en-US", "Title")
            .with_field("next", "en-US", Link::entry("b"))
            .with_field("skip", "en-US", Link::entry("b"));
        let locales = LocaleConfig::new("en-US").with_locale("de-DE", Some("en-US"));
        let resolver = LinkResolver::new(&store, locales);
        let options = ResolveOptions::new(1).with_fields(["next"]).with_locale("de-DE");
        let graph = resolver.resolve_with(&root, &options).unwrap();

        let view = graph.root();
        assert_eq!(view.field("title").and_then(Resolved::as_value), Some(&json!("Titel")));
        assert!(view.linked("next").is_some());
        assert!(view.field("skip").and_then(Resolved::as_link).is_some());
    }

    #[test]
    fn seeded_backlinks_are_not_fetched() {
        let store = store(vec![]);
        let parent = node("p", &["a"]);
        let root = node("a", &["p"]);
        let options = ResolveOptions::new(2).with_backlinks(vec![parent]);
        let graph = resolver(&store).resolve_with(&root, &options).unwrap();
        assert_eq!(graph.root().linked("next").unwrap().id(), "p");
        assert_eq!(graph.lookups(), 0);
    }

    #[test]
    fn query_results_resolve_from_included() {
        let store = store(vec![node("a", &["b"]), node("b", &[])]);
        let result = store
            .find_all("node")
            .eq("sys.id", "a")
            .unwrap()
            .include(1)
            .unwrap()
            .execute()
            .unwrap();
        let finds = store.stats().finds();
        let graphs = result.resolve_items(&LocaleConfig::default(), 1).unwrap();
        assert_eq!(graphs[0].root().linked("next").unwrap().id(), "b");
        assert_eq!(store.stats().finds(), finds);
    }

    #[test]
    fn resolvable_trait() {
        let store = store(vec![node("b", &[])]);
        let root = node("a", &["b"]);
        let graph = root.resolve(&resolver(&store), 1).unwrap();
        assert!(graph.contains("b"));
    }
}
