//! # contentmirror testkit
//!
//! Test utilities for contentmirror.
//!
//! This crate provides:
//! - Record builders and a small blog-shaped fixture corpus
//! - Seeded memory, SQLite and mock-source fixtures
//! - Link graph scenarios (cycles, diamonds, chains)
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use contentmirror_store::StoreExt;
//! use contentmirror_testkit::prelude::*;
//!
//! let store = seeded_memory_store(blog_records());
//! let posts = store.find_all("post").eq("author.name", "Ada").unwrap().to_vec().unwrap();
//! assert_eq!(posts.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scenarios;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scenarios::*;
}

pub use fixtures::*;
pub use generators::*;
