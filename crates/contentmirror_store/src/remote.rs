//! Passthrough store over a remote content source.

use crate::error::{StoreError, StoreResult};
use crate::include::IncludedRecords;
use crate::query::{Condition, FieldPath, Operator, QueryResult, QuerySpec, Scope};
use crate::store::ContentStore;
use contentmirror_core::{Config, ContentTypeRegistry, Record, ASSET_CONTENT_TYPE};
use contentmirror_protocol::{CollectionPage, ContentSource, QueryParams};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

/// A read-only store that forwards every lookup to a [`ContentSource`].
///
/// Queries are translated into the remote `field[op]=value` grammar; the
/// source does the filtering and include stitching. Writes are unsupported.
pub struct RemoteStore<C: ContentSource> {
    source: C,
    config: Config,
    registry: Option<ContentTypeRegistry>,
    cache: RwLock<HashMap<(String, QueryParams), CollectionPage>>,
}

impl<C: ContentSource> std::fmt::Debug for RemoteStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("cached_responses", &self.cache.read().len())
            .finish()
    }
}

impl<C: ContentSource> RemoteStore<C> {
    /// Creates a store over `source`.
    pub fn new(source: C, config: Config) -> Self {
        Self {
            source,
            config,
            registry: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Validates query field names against `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: ContentTypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Returns the underlying source.
    pub fn source(&self) -> &C {
        &self.source
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    fn fetch(&self, path: &str, params: QueryParams, cache: bool) -> StoreResult<Option<CollectionPage>> {
        let key = (path.to_string(), params);
        if cache {
            if let Some(page) = self.cache.read().get(&key) {
                trace!(path, "remote response served from cache");
                return Ok(Some(page.clone()));
            }
        }
        let page = self.source.get(&key.0, &key.1)?;
        if cache {
            if let Some(page) = &page {
                self.cache.write().insert(key, page.clone());
            }
        }
        Ok(page)
    }

    fn unsupported(&self, operation: &'static str) -> StoreError {
        StoreError::Unsupported {
            backend: self.backend_name(),
            operation,
        }
    }
}

impl<C: ContentSource> ContentStore for RemoteStore<C> {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn registry(&self) -> Option<&ContentTypeRegistry> {
        self.registry.as_ref()
    }

    fn find(&self, id: &str) -> StoreResult<Option<Record>> {
        for collection in ["entries", "assets"] {
            let params = QueryParams::new().with("locale", "*");
            let path = format!("/{collection}/{}", urlencoding::encode(id));
            if let Some(page) = self.source.get(&path, &params)? {
                return Ok(page.items.into_iter().next());
            }
        }
        Ok(None)
    }

    fn set(&self, _id: &str, _record: Record) -> StoreResult<Option<Record>> {
        Err(self.unsupported("set"))
    }

    fn delete(&self, _id: &str) -> StoreResult<Option<Record>> {
        Err(self.unsupported("delete"))
    }

    fn index(&self, _record: Record) -> StoreResult<Option<Record>> {
        Err(self.unsupported("index"))
    }

    fn supports_indexing(&self) -> bool {
        false
    }

    fn execute(&self, spec: &QuerySpec) -> StoreResult<QueryResult> {
        let params = translate(spec)?;
        let path = if spec.content_type == ASSET_CONTENT_TYPE {
            "/assets"
        } else {
            "/entries"
        };
        debug!(path, params = %params.to_query_string(), "remote query");

        let Some(page) = self.fetch(path, params, spec.options.cache_response)? else {
            return Ok(QueryResult::default());
        };
        let included: IncludedRecords = page
            .items
            .iter()
            .chain(page.includes.iter())
            .cloned()
            .collect();
        Ok(QueryResult {
            total: page.total.max(page.items.len()),
            items: page.items,
            included,
        })
    }
}

/// Translates a query into remote parameters. Fails before any I/O.
pub fn translate(spec: &QuerySpec) -> StoreResult<QueryParams> {
    let mut params = QueryParams::new();
    if spec.content_type != ASSET_CONTENT_TYPE {
        params.push("content_type", spec.content_type.as_str());
    }
    params.push("locale", spec.options.locale.as_deref().unwrap_or("*"));
    for condition in &spec.conditions {
        let (key, value) = translate_condition(condition)?;
        params.push(key, value);
    }
    if spec.options.include > 0 {
        params.push("include", spec.options.include.to_string());
    }
    if let Some(limit) = spec.options.limit {
        params.push("limit", limit.to_string());
    }
    if spec.options.skip > 0 {
        params.push("skip", spec.options.skip.to_string());
    }
    Ok(params)
}

fn translate_condition(condition: &Condition) -> StoreResult<(String, String)> {
    let op = condition.operator();
    let path = condition.path();
    if path.joined().is_some() && op.is_range() {
        return Err(StoreError::invalid_query(format!(
            "`{op}` across a reference is not supported by the remote store"
        )));
    }

    let key = match op {
        Operator::Eq => remote_path(path),
        other => format!("{}[{}]", remote_path(path), other.as_str()),
    };
    let value = match op {
        Operator::Exists => condition.expects_presence().to_string(),
        Operator::In | Operator::Nin => {
            let items = condition
                .expected_list()
                .iter()
                .map(|v| {
                    let scalar = remote_scalar(v)?;
                    if scalar.contains(',') {
                        return Err(StoreError::invalid_query(format!(
                            "`{op}` values containing commas are not supported by the remote store"
                        )));
                    }
                    Ok(scalar)
                })
                .collect::<StoreResult<Vec<_>>>()?;
            items.join(",")
        }
        _ => remote_scalar(condition.expected())?,
    };
    Ok((key, value))
}

fn remote_path(path: &FieldPath) -> String {
    path.segments()
        .iter()
        .map(|s| match s.scope {
            Scope::Sys => format!("sys.{}", s.name),
            Scope::Fields => format!("fields.{}", s.name),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn remote_scalar(value: &Value) -> StoreResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(StoreError::invalid_query(format!(
            "value {other} is not supported by the remote store"
        ))),
    }
}
