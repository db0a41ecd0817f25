//! # contentmirror store
//!
//! Where mirrored records live and how they are queried.
//!
//! This crate provides:
//! - [`ContentStore`], the backend contract, with the revision gate applied
//!   by [`ContentStore::index`]
//! - [`Query`], an immutable filter builder with dotted and nested-object
//!   paths, locale fallback and single-hop link joins
//! - Three backends: [`MemoryStore`], [`SqlStore`] (SQLite) and
//!   [`RemoteStore`] (read-only passthrough to a content source)
//! - [`IncludedRecords`], linked records stitched into a query result with one
//!   bulk lookup per level
//!
//! ## Example
//!
//! ```rust
//! use contentmirror_core::{Config, Link, Record};
//! use contentmirror_store::{ContentStore, MemoryStore, StoreExt};
//!
//! let store = MemoryStore::new(Config::default());
//! store.index(Record::entry("au1", "author").with_field("name", "en-US", "Ada")).unwrap();
//! store.index(
//!     Record::entry("p1", "post").with_field("author", "en-US", Link::entry("au1")),
//! ).unwrap();
//!
//! let result = store
//!     .find_all("post")
//!     .eq("author.name", "Ada").unwrap()
//!     .include(1).unwrap()
//!     .execute().unwrap();
//! assert_eq!(result.items.len(), 1);
//! assert!(result.included.contains("au1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod include;
mod memory;
pub mod query;
mod remote;
mod sql;
mod stats;
mod store;

pub use error::{StoreError, StoreResult};
pub use include::IncludedRecords;
pub use memory::MemoryStore;
pub use query::{Condition, Operator, Query, QueryOptions, QueryResult, QuerySpec};
pub use remote::{translate as translate_remote_query, RemoteStore};
pub use sql::SqlStore;
pub use stats::StoreStats;
pub use store::{revision_gate, ContentStore, RecordLookup, RevisionDecision, StoreExt};
