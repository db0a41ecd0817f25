//! # contentmirror sync engine
//!
//! Pulls the delta stream of a content source into a store.
//!
//! This crate provides:
//! - [`SyncEngine::next`], one serialized sync call: fetch pages, apply each
//!   item through the store's revision gate, publish events, persist the cursor
//! - [`SyncEvent`] and [`EventBus`] for trait or channel subscribers
//! - [`SyncState`] and [`SyncStats`] for observing the engine
//! - [`SyncConfig`] and [`RetryPolicy`] for callers that reschedule failed calls
//!
//! ## Key Invariants
//!
//! - The cursor is persisted only after every item of the call was applied
//! - Re-applying a page is harmless: older revisions never overwrite newer ones
//! - A failing subscriber never aborts a sync
//! - Source errors are returned, never retried inside `next`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod event;
mod state;

pub use config::{RetryPolicy, SyncConfig, DEFAULT_CURSOR_KEY};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use event::{EventBus, SubscriberError, SyncEvent, SyncSubscriber};
pub use state::{SyncOutcome, SyncState, SyncStats};
