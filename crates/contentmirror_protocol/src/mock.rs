//! In-process content source for tests.

use crate::error::{SourceError, SourceResult};
use crate::source::{CollectionPage, ContentSource, QueryParams, SyncPage};
use contentmirror_core::Record;
use parking_lot::Mutex;
use std::collections::HashMap;

const TOKEN_PREFIX: &str = "mock-";

/// A content source backed by an append-only change log.
///
/// Cursors are positions in the log, so a second `sync` with the cursor from
/// the first returns only the changes published in between. Collection
/// responses are scripted per path; point lookups (`/entries/<id>`,
/// `/assets/<id>`) answer from the latest published state.
#[derive(Debug, Default)]
pub struct MockSource {
    log: Mutex<Vec<Record>>,
    page_size: usize,
    responses: Mutex<HashMap<String, CollectionPage>>,
    failures: Mutex<Vec<SourceError>>,
    sync_calls: Mutex<Vec<Option<String>>>,
    get_calls: Mutex<Vec<(String, QueryParams)>>,
}

impl MockSource {
    /// Creates an empty source returning up to 100 items per page.
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    /// Creates an empty source with the given page size.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            ..Self::default()
        }
    }

    /// Publishes a change.
    pub fn publish(&self, record: Record) {
        self.log.lock().push(record);
    }

    /// Publishes several changes.
    pub fn publish_all(&self, records: impl IntoIterator<Item = Record>) {
        self.log.lock().extend(records);
    }

    /// Scripts the response for a collection path.
    pub fn set_response(&self, path: &str, page: CollectionPage) {
        self.responses.lock().insert(path.to_string(), page);
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: SourceError) {
        self.failures.lock().push(error);
    }

    /// Returns the cursors passed to `sync`, in call order.
    pub fn sync_calls(&self) -> Vec<Option<String>> {
        self.sync_calls.lock().clone()
    }

    /// Returns the `(path, params)` pairs passed to `get`, in call order.
    pub fn get_calls(&self) -> Vec<(String, QueryParams)> {
        self.get_calls.lock().clone()
    }

    fn take_failure(&self) -> SourceResult<()> {
        match self.failures.lock().pop() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn latest(&self, id: &str) -> Option<Record> {
        self.log
            .lock()
            .iter()
            .rev()
            .find(|r| r.id() == id)
            .filter(|r| !r.is_deletion())
            .cloned()
    }
}

fn parse_cursor(cursor: &str) -> SourceResult<usize> {
    cursor
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|pos| pos.parse().ok())
        .ok_or_else(|| SourceError::Protocol(format!("unknown sync token {cursor}")))
}

impl ContentSource for MockSource {
    fn sync(&self, cursor: Option<&str>) -> SourceResult<SyncPage> {
        self.sync_calls.lock().push(cursor.map(str::to_string));
        self.take_failure()?;

        let start = match cursor {
            Some(cursor) => parse_cursor(cursor)?,
            None => 0,
        };
        let log = self.log.lock();
        let start = start.min(log.len());
        let end = (start + self.page_size).min(log.len());
        Ok(SyncPage {
            items: log[start..end].to_vec(),
            next_cursor: format!("{TOKEN_PREFIX}{end}"),
            has_more: end < log.len(),
        })
    }

    fn get(&self, path: &str, params: &QueryParams) -> SourceResult<Option<CollectionPage>> {
        self.get_calls
            .lock()
            .push((path.to_string(), params.clone()));
        self.take_failure()?;

        if let Some(page) = self.responses.lock().get(path) {
            return Ok(Some(page.clone()));
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            [collection @ ("entries" | "assets"), id] => {
                let wanted_asset = *collection == "assets";
                Ok(self
                    .latest(id)
                    .filter(|r| (r.kind() == contentmirror_core::RecordKind::Asset) == wanted_asset)
                    .map(|r| CollectionPage::of(vec![r])))
            }
            _ => Err(SourceError::NotFound {
                path: path.to_string(),
            }),
        }
    }
}
