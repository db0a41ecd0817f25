//! Query construction.
//!
//! A [`Query`] is immutable: every operator returns a new query with one
//! more condition, so partially built queries can be shared and extended.
//! All validation happens while building; backends only see well-formed
//! [`QuerySpec`]s.

mod condition;
mod filter;
mod options;
mod path;

pub use condition::{Condition, Operator};
pub use filter::{parse_filter, ParsedFilter, RawCondition, OPTIONS_KEY};
pub use options::QueryOptions;
pub use path::{normalize_path, FieldPath, Scope, Segment, SYS_ATTRIBUTES};

use crate::error::{StoreError, StoreResult};
use crate::include::IncludedRecords;
use crate::store::ContentStore;
use contentmirror_core::Record;
use serde_json::Value;

/// A validated query, ready for a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Content type the query ranges over.
    pub content_type: String,
    /// Conditions, all of which must hold.
    pub conditions: Vec<Condition>,
    /// Options fixed at creation.
    pub options: QueryOptions,
}

/// Records matching a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Matching records after `skip` and `limit`, ordered by id.
    pub items: Vec<Record>,
    /// `items` plus linked records stitched in up to the include depth.
    pub included: IncludedRecords,
    /// Number of matches before `skip` and `limit`.
    pub total: usize,
}

/// An immutable query bound to a store.
pub struct Query<'s, S: ContentStore + ?Sized> {
    store: &'s S,
    spec: QuerySpec,
}

impl<S: ContentStore + ?Sized> Clone for Query<'_, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            spec: self.spec.clone(),
        }
    }
}

impl<S: ContentStore + ?Sized> std::fmt::Debug for Query<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("backend", &self.store.backend_name())
            .field("spec", &self.spec)
            .finish()
    }
}

impl<'s, S: ContentStore + ?Sized> Query<'s, S> {
    pub(crate) fn new(store: &'s S, content_type: &str, options: QueryOptions) -> Self {
        Self {
            store,
            spec: QuerySpec {
                content_type: content_type.to_string(),
                conditions: Vec::new(),
                options,
            },
        }
    }

    pub(crate) fn with_options(
        store: &'s S,
        content_type: &str,
        options: QueryOptions,
    ) -> StoreResult<Self> {
        check_include(store, options.include)?;
        Ok(Self::new(store, content_type, options))
    }

    pub(crate) fn from_filter(store: &'s S, content_type: &str, filter: &Value) -> StoreResult<Self> {
        let parsed = parse_filter(filter)?;
        let query = Self::with_options(store, content_type, parsed.options.unwrap_or_default())?;
        query.push_raw(parsed.conditions)
    }

    /// Returns the validated query.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Adds a condition on a dotted path such as `"slug"` or `"author.name"`.
    pub fn apply(&self, path: &str, operator: Operator, value: impl Into<Value>) -> StoreResult<Self> {
        let segments: Vec<&str> = path.split('.').collect();
        let condition = self.condition(segments.as_slice(), operator, value.into())?;
        let mut next = self.clone();
        next.spec.conditions.push(condition);
        Ok(next)
    }

    /// Adds every condition of a nested JSON filter.
    ///
    /// Query options are fixed at creation, so an `options` key is rejected.
    pub fn filter(&self, filter: &Value) -> StoreResult<Self> {
        let parsed = parse_filter(filter)?;
        if parsed.options.is_some() {
            return Err(StoreError::invalid_query(
                "options can only be given when the query is created",
            ));
        }
        self.push_raw(parsed.conditions)
    }

    /// `path == value`
    pub fn eq(&self, path: &str, value: impl Into<Value>) -> StoreResult<Self> {
        self.apply(path, Operator::Eq, value)
    }

    /// `path != value`
    pub fn ne(&self, path: &str, value: impl Into<Value>) -> StoreResult<Self> {
        self.apply(path, Operator::Ne, value)
    }

    /// `path` is one of `values`.
    pub fn is_in<V: Into<Value>>(
        &self,
        path: &str,
        values: impl IntoIterator<Item = V>,
    ) -> StoreResult<Self> {
        let list: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.apply(path, Operator::In, list)
    }

    /// `path` is none of `values`.
    pub fn nin<V: Into<Value>>(
        &self,
        path: &str,
        values: impl IntoIterator<Item = V>,
    ) -> StoreResult<Self> {
        let list: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.apply(path, Operator::Nin, list)
    }

    /// `path < value`
    pub fn lt(&self, path: &str, value: impl Into<Value>) -> StoreResult<Self> {
        self.apply(path, Operator::Lt, value)
    }

    /// `path <= value`
    pub fn lte(&self, path: &str, value: impl Into<Value>) -> StoreResult<Self> {
        self.apply(path, Operator::Lte, value)
    }

    /// `path > value`
    pub fn gt(&self, path: &str, value: impl Into<Value>) -> StoreResult<Self> {
        self.apply(path, Operator::Gt, value)
    }

    /// `path >= value`
    pub fn gte(&self, path: &str, value: impl Into<Value>) -> StoreResult<Self> {
        self.apply(path, Operator::Gte, value)
    }

    /// `path` is present (`true`) or absent (`false`).
    pub fn exists(&self, path: &str, present: bool) -> StoreResult<Self> {
        self.apply(path, Operator::Exists, present)
    }

    /// Limits the number of returned items.
    #[must_use]
    pub fn limit(&self, limit: usize) -> Self {
        let mut next = self.clone();
        next.spec.options.limit = Some(limit);
        next
    }

    /// Skips the first `skip` matches.
    #[must_use]
    pub fn skip(&self, skip: usize) -> Self {
        let mut next = self.clone();
        next.spec.options.skip = skip;
        next
    }

    /// Sets the include depth.
    pub fn include(&self, depth: usize) -> StoreResult<Self> {
        check_include(self.store, depth)?;
        let mut next = self.clone();
        next.spec.options.include = depth;
        Ok(next)
    }

    /// Runs the query.
    pub fn execute(&self) -> StoreResult<QueryResult> {
        self.store.execute(&self.spec)
    }

    /// Runs the query and returns the matching records.
    pub fn to_vec(&self) -> StoreResult<Vec<Record>> {
        Ok(self.execute()?.items)
    }

    /// Returns the first match.
    pub fn first(&self) -> StoreResult<Option<Record>> {
        Ok(self.limit(1).execute()?.items.into_iter().next())
    }

    /// Returns the number of matches, ignoring `skip` and `limit`.
    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.execute()?.total)
    }

    fn push_raw(&self, raw: Vec<RawCondition>) -> StoreResult<Self> {
        let mut next = self.clone();
        for condition in raw {
            let condition =
                self.condition(condition.path.as_slice(), condition.operator, condition.value)?;
            next.spec.conditions.push(condition);
        }
        Ok(next)
    }

    fn condition<P: AsRef<str>>(
        &self,
        raw: &[P],
        operator: Operator,
        value: Value,
    ) -> StoreResult<Condition> {
        let config = self.store.config();
        let path = FieldPath::parse(
            raw,
            &config.locales,
            self.spec.options.locale.as_deref(),
            config.max_path_segments,
        )?;
        let head = path.head();
        if head.scope == Scope::Fields {
            if let Some(registry) = self.store.registry() {
                registry
                    .validate_field(&self.spec.content_type, &head.name)
                    .map_err(|e| StoreError::invalid_query(e.to_string()))?;
            }
        }
        Condition::new(path, operator, value)
    }
}

fn check_include<S: ContentStore + ?Sized>(store: &S, depth: usize) -> StoreResult<()> {
    let max = store.config().max_include_depth;
    if depth > max {
        return Err(StoreError::invalid_query(format!(
            "include depth {depth} exceeds the maximum of {max}"
        )));
    }
    Ok(())
}
