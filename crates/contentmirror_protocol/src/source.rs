//! The remote content source contract.

use crate::error::SourceResult;
use contentmirror_core::Record;
use serde::{Deserialize, Serialize};

/// One page of the delta stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPage {
    /// Changed records, in the order the source emitted them.
    pub items: Vec<Record>,
    /// Cursor to pass to the next call.
    pub next_cursor: String,
    /// Whether more pages follow for the same sync round.
    pub has_more: bool,
}

impl SyncPage {
    /// Creates a page.
    pub fn new(items: Vec<Record>, next_cursor: impl Into<String>, has_more: bool) -> Self {
        Self {
            items,
            next_cursor: next_cursor.into(),
            has_more,
        }
    }
}

/// Linked records shipped alongside a collection response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Includes {
    /// Included entries.
    #[serde(rename = "Entry", default)]
    pub entries: Vec<Record>,
    /// Included assets.
    #[serde(rename = "Asset", default)]
    pub assets: Vec<Record>,
}

impl Includes {
    /// Returns true if nothing was included.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.assets.is_empty()
    }

    /// Iterates over every included record.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().chain(self.assets.iter())
    }
}

/// A page of a collection (or point) lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionPage {
    /// Matching records.
    #[serde(default)]
    pub items: Vec<Record>,
    /// Records linked from `items`, up to the requested include depth.
    #[serde(default)]
    pub includes: Includes,
    /// Total number of matches on the server.
    #[serde(default)]
    pub total: usize,
    /// Offset of this page.
    #[serde(default)]
    pub skip: usize,
    /// Page size.
    #[serde(default)]
    pub limit: usize,
}

impl CollectionPage {
    /// Creates a page holding exactly `items`.
    pub fn of(items: Vec<Record>) -> Self {
        Self {
            total: items.len(),
            limit: items.len(),
            items,
            includes: Includes::default(),
            skip: 0,
        }
    }

    /// Sets the included records.
    #[must_use]
    pub fn with_includes(mut self, includes: Includes) -> Self {
        self.includes = includes;
        self
    }
}

/// Ordered query parameters in the remote grammar (`field[op]=value`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Builder-style append.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Returns the first value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Encodes the pairs as a URL query string (without the leading `?`).
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A remote service holding the authoritative content graph.
///
/// Implementations handle pagination, authentication and rate limiting.
/// Errors returned here are not retried by the caller.
pub trait ContentSource: Send + Sync {
    /// Fetches one page of the delta stream.
    ///
    /// `None` requests an initial, full sync.
    fn sync(&self, cursor: Option<&str>) -> SourceResult<SyncPage>;

    /// Reads a collection or a single record.
    ///
    /// Returns `Ok(None)` when a point lookup does not exist.
    fn get(&self, path: &str, params: &QueryParams) -> SourceResult<Option<CollectionPage>>;
}

impl<T: ContentSource + ?Sized> ContentSource for std::sync::Arc<T> {
    fn sync(&self, cursor: Option<&str>) -> SourceResult<SyncPage> {
        (**self).sync(cursor)
    }

    fn get(&self, path: &str, params: &QueryParams) -> SourceResult<Option<CollectionPage>> {
        (**self).get(path, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_encoding() {
        let params = QueryParams::new()
            .with("content_type", "page")
            .with("fields.slug", "/about us")
            .with("fields.tags[in]", "a,b");
        assert_eq!(
            params.to_query_string(),
            "content_type=page&fields.slug=%2Fabout%20us&fields.tags%5Bin%5D=a%2Cb"
        );
        assert_eq!(params.get("content_type"), Some("page"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn decodes_collection_page() {
        let page: CollectionPage = serde_json::from_str(
            r#"{
                "sys": {"type": "Array"},
                "total": 1, "skip": 0, "limit": 100,
                "items": [{"sys": {"id": "e1", "type": "Entry"}}],
                "includes": {"Asset": [{"sys": {"id": "a1", "type": "Asset"}}]}
            }"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.includes.assets.len(), 1);
        assert!(page.includes.entries.is_empty());
        assert_eq!(page.includes.iter().count(), 1);
    }
}
