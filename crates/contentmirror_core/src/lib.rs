//! # contentmirror core
//!
//! Data model shared by every contentmirror crate.
//!
//! This crate provides:
//! - [`Record`] and [`Sys`], the wire shape of entries, assets, deletions and
//!   the persisted sync token
//! - [`Link`], the unresolved reference value stored inside fields
//! - [`ContentTypeRegistry`], an explicit schema table (no global state)
//! - [`Config`] and [`LocaleConfig`], passed by value to stores and engines
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod link;
mod record;
mod schema;

pub use config::{Config, LocaleConfig};
pub use error::{CoreError, CoreResult};
pub use link::{collect_links, Link, LinkType};
pub use record::{Record, RecordIdentity, RecordKind, Sys, ASSET_CONTENT_TYPE};
pub use schema::{ContentType, ContentTypeRegistry, FieldDescriptor, FieldKind, ItemsDescriptor};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
