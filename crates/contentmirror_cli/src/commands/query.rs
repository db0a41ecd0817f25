//! Query command implementation.

use super::{CliError, Format};
use contentmirror_store::{
    ContentStore, Operator, QueryOptions, QueryResult, SqlStore, StoreError, StoreExt,
};
use serde_json::{json, Value};
use std::io::Write;

/// Arguments of the query command.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Content type id.
    pub content_type: String,
    /// Raw `path=value` / `path[op]=value` conditions.
    pub filters: Vec<String>,
    /// Include depth.
    pub include: usize,
    /// Page size.
    pub limit: Option<usize>,
    /// Items to skip.
    pub skip: usize,
    /// Locale for field paths.
    pub locale: Option<String>,
}

/// One parsed `--filter` argument.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterArg {
    /// Dotted path.
    pub path: String,
    /// Operator, `eq` when no suffix is given.
    pub operator: Operator,
    /// Operand.
    pub value: Value,
}

/// Parses `path=value` or `path[op]=value`.
///
/// Values are read as JSON when they parse as JSON and as plain strings
/// otherwise. `in`/`nin` operands are split on commas unless they are a JSON array.
pub fn parse_filter(raw: &str) -> Result<FilterArg, StoreError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| StoreError::invalid_query(format!("filter {raw:?} is not path=value")))?;

    let (path, operator) = match key.strip_suffix(']').and_then(|k| k.split_once('[')) {
        Some((path, op)) => {
            let operator = Operator::parse(op)
                .ok_or_else(|| StoreError::invalid_query(format!("unknown operator {op:?}")))?;
            (path, operator)
        }
        None => (key, Operator::Eq),
    };
    if path.is_empty() {
        return Err(StoreError::invalid_query(format!("filter {raw:?} has no path")));
    }

    let value = match operator {
        Operator::In | Operator::Nin if !value.trim_start().starts_with('[') => {
            Value::Array(value.split(',').map(scalar).collect())
        }
        _ => scalar(value),
    };
    Ok(FilterArg {
        path: path.to_string(),
        operator,
        value,
    })
}

fn scalar(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Executes the request.
pub fn execute<S: ContentStore + ?Sized>(store: &S, request: &QueryRequest) -> Result<QueryResult, CliError> {
    let mut options = QueryOptions::new()
        .with_include(request.include)
        .with_skip(request.skip);
    if let Some(limit) = request.limit {
        options = options.with_limit(limit);
    }
    if let Some(locale) = &request.locale {
        options = options.with_locale(locale.clone());
    }

    let mut query = store.find_all_with(&request.content_type, options)?;
    for raw in &request.filters {
        let filter = parse_filter(raw)?;
        query = query.apply(&filter.path, filter.operator, filter.value)?;
    }
    Ok(query.execute()?)
}

/// Runs the query command.
pub fn run(store: &SqlStore, request: &QueryRequest, format: Format, out: &mut impl Write) -> Result<(), CliError> {
    let result = execute(store, request)?;
    match format {
        Format::Json => {
            let linked: Vec<&str> = result
                .included
                .iter()
                .map(|r| r.id())
                .filter(|id| !result.items.iter().any(|item| item.id() == *id))
                .collect();
            let body = json!({
                "total": result.total,
                "items": result.items,
                "included": linked,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
        }
        Format::Text => {
            writeln!(
                out,
                "{} of {} {} record(s)",
                result.items.len(),
                result.total,
                request.content_type
            )?;
            for item in &result.items {
                writeln!(out, "  {} (rev {})", item.id(), item.revision().unwrap_or(0))?;
            }
            let linked = result.included.len().saturating_sub(result.items.len());
            if linked > 0 {
                writeln!(out, "{linked} linked record(s) included")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_testkit::{blog_records, seeded_sql_store};

    #[test]
    fn parses_filter_arguments() {
        let eq = parse_filter("slug=/engines").unwrap();
        assert_eq!(eq.operator, Operator::Eq);
        assert_eq!(eq.value, json!("/engines"));

        let gte = parse_filter("views[gte]=100").unwrap();
        assert_eq!(gte.path, "views");
        assert_eq!(gte.operator, Operator::Gte);
        assert_eq!(gte.value, json!(100));

        let within = parse_filter("sys.id[in]=p1,p3").unwrap();
        assert_eq!(within.value, json!(["p1", "p3"]));

        assert_eq!(parse_filter("featured=true").unwrap().value, json!(true));
        assert!(parse_filter("novalue").is_err());
        assert!(parse_filter("views[between]=1").is_err());
        assert!(parse_filter("=1").is_err());
    }

    #[test]
    fn runs_join_query_with_includes() {
        let store = seeded_sql_store(blog_records());
        let request = QueryRequest {
            content_type: "post".into(),
            filters: vec!["author.name=Ada".into(), "views[gt]=50".into()],
            include: 1,
            ..QueryRequest::default()
        };
        let result = execute(&store, &request).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id(), "p1");
        assert!(result.included.contains("au1"));

        let mut out = Vec::new();
        run(&store, &request, Format::Json, &mut out).unwrap();
        let json: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["total"], 1);
        assert!(json["included"].as_array().unwrap().contains(&json!("au1")));
    }
}
