//! # contentmirror protocol
//!
//! The contract between the mirror and the remote content service.
//!
//! This crate provides:
//! - [`ContentSource`], the delta-sync and lookup interface the sync engine
//!   and the passthrough store are written against
//! - [`SyncPage`] and [`CollectionPage`] wire types
//! - [`QueryParams`] for the `field[operator]=value` grammar
//! - [`HttpSource`], a [`ContentSource`] over any [`HttpClient`], with a
//!   bounded rate-limit backoff
//! - [`MockSource`], an in-process delta log for tests
//!
//! Pagination, authentication and backoff live here; nothing above this
//! crate retries.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod http;
mod mock;
mod source;

pub use error::{SourceError, SourceResult};
pub use http::{HttpClient, HttpResponse, HttpSource, HttpSourceConfig};
pub use mock::MockSource;
pub use source::{CollectionPage, ContentSource, Includes, QueryParams, SyncPage};
