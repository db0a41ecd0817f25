//! # contentmirror resolve
//!
//! Expands links between mirrored records.
//!
//! This crate provides:
//! - [`LinkResolver`], which replaces links with the records they point at,
//!   up to a requested depth, looking each distinct id up at most once
//! - [`ResolvedGraph`], an arena of resolved records keyed by id, browsed
//!   through [`EntryView`]s; cycles are ids naming each other
//! - [`CircularPolicy`] to reuse the ancestor, fail, or leave back-edges alone
//! - [`LinkVisitor`], a read-only schema-driven walk over raw fields
//!
//! ## Example
//!
//! ```rust
//! use contentmirror_core::{Config, Link, Record};
//! use contentmirror_resolve::{LinkResolver, Resolvable};
//! use contentmirror_store::{ContentStore, MemoryStore};
//!
//! let store = MemoryStore::new(Config::default());
//! store.index(Record::entry("a", "node").with_field("next", "en-US", Link::entry("b"))).unwrap();
//! store.index(Record::entry("b", "node").with_field("next", "en-US", Link::entry("a"))).unwrap();
//!
//! let resolver = LinkResolver::new(&store, store.config().locales.clone());
//! let a = store.find("a").unwrap().unwrap();
//! let graph = a.resolve(&resolver, 99).unwrap();
//!
//! let root = graph.root();
//! let again = root.linked("next").unwrap().linked("next").unwrap();
//! assert!(again.ptr_eq(&root));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod graph;
mod options;
mod resolver;
mod visitor;

pub use error::{ResolveError, ResolveResult};
pub use graph::{EntryView, Resolved, ResolvedGraph};
pub use options::{CircularPolicy, ResolveOptions};
pub use resolver::{LinkResolver, Resolvable, ResolveIncluded};
pub use visitor::{LinkVisitor, Visit};
