//! Per-query options.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options fixed when a query is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryOptions {
    /// Locale used to normalize field paths. `None` uses the default locale.
    #[serde(default)]
    pub locale: Option<String>,
    /// How many link levels to stitch into the result.
    #[serde(default)]
    pub include: usize,
    /// Maximum number of items to return.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Number of matching items to skip.
    #[serde(default)]
    pub skip: usize,
    /// Remember the response and answer repeats from memory (remote only).
    #[serde(default, alias = "cache_response")]
    pub cache_response: bool,
}

impl QueryOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a JSON object.
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| StoreError::invalid_query(format!("invalid options: {e}")))
    }

    /// Sets the locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the include depth.
    #[must_use]
    pub fn with_include(mut self, include: usize) -> Self {
        self.include = include;
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the skip count.
    #[must_use]
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Enables response caching.
    #[must_use]
    pub fn with_cache_response(mut self) -> Self {
        self.cache_response = true;
        self
    }
}
