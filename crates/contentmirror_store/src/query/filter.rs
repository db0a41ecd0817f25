//! Flattening of nested JSON filters.

use super::condition::Operator;
use super::options::QueryOptions;
use crate::error::{StoreError, StoreResult};
use serde_json::{Map, Value};

/// Key reserved for query options inside a filter object.
pub const OPTIONS_KEY: &str = "options";

/// A condition before path normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCondition {
    /// Caller path segments.
    pub path: Vec<String>,
    /// Operator.
    pub operator: Operator,
    /// Expected value.
    pub value: Value,
}

/// A filter split into raw conditions and options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFilter {
    /// Conditions in key order.
    pub conditions: Vec<RawCondition>,
    /// Options from the reserved `options` key.
    pub options: Option<QueryOptions>,
}

/// Flattens a JSON filter.
///
/// Dotted keys and nested objects both extend the path. An object whose keys
/// are all operator names sets operators explicitly; otherwise an array value
/// means `in` and anything else means `eq`.
pub fn parse_filter(filter: &Value) -> StoreResult<ParsedFilter> {
    let object = filter
        .as_object()
        .ok_or_else(|| StoreError::invalid_query("filter must be an object"))?;

    let mut parsed = ParsedFilter::default();
    for (key, value) in object {
        if key == OPTIONS_KEY {
            parsed.options = Some(QueryOptions::from_value(value)?);
            continue;
        }
        flatten(&[], key, value, &mut parsed.conditions)?;
    }
    Ok(parsed)
}

fn flatten(
    prefix: &[String],
    key: &str,
    value: &Value,
    out: &mut Vec<RawCondition>,
) -> StoreResult<()> {
    if key.is_empty() || key.split('.').any(str::is_empty) {
        return Err(StoreError::invalid_query(format!("invalid filter key `{key}`")));
    }
    let mut path = prefix.to_vec();
    path.extend(key.split('.').map(str::to_string));

    match value {
        Value::Object(map) if map.is_empty() => Err(StoreError::invalid_query(format!(
            "empty condition for `{}`",
            path.join(".")
        ))),
        Value::Object(map) if is_operator_map(map) => {
            for (name, expected) in map {
                if let Some(operator) = Operator::parse(name) {
                    out.push(RawCondition {
                        path: path.clone(),
                        operator,
                        value: expected.clone(),
                    });
                }
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, value) in map {
                flatten(&path, key, value, out)?;
            }
            Ok(())
        }
        Value::Array(_) => {
            out.push(RawCondition {
                path,
                operator: Operator::In,
                value: value.clone(),
            });
            Ok(())
        }
        _ => {
            out.push(RawCondition {
                path,
                operator: Operator::Eq,
                value: value.clone(),
            });
            Ok(())
        }
    }
}

fn is_operator_map(map: &Map<String, Value>) -> bool {
    map.keys().all(|k| Operator::parse(k).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(parsed: &ParsedFilter) -> Vec<(String, Operator)> {
        parsed
            .conditions
            .iter()
            .map(|c| (c.path.join("."), c.operator))
            .collect()
    }

    #[test]
    fn nested_and_dotted_keys_agree() {
        let nested = parse_filter(&json!({"page": {"slug": "/about"}})).unwrap();
        let dotted = parse_filter(&json!({"page.slug": "/about"})).unwrap();
        assert_eq!(nested, dotted);
        assert_eq!(paths(&nested), vec![("page.slug".to_string(), Operator::Eq)]);
    }

    #[test]
    fn arrays_mean_in() {
        let parsed = parse_filter(&json!({"tags": ["a", "b"]})).unwrap();
        assert_eq!(parsed.conditions[0].operator, Operator::In);
    }

    #[test]
    fn explicit_operators() {
        let parsed = parse_filter(&json!({"views": {"gte": 10, "lt": 100}})).unwrap();
        let mut ops: Vec<Operator> = parsed.conditions.iter().map(|c| c.operator).collect();
        ops.sort_by_key(|op| op.as_str());
        assert_eq!(ops, vec![Operator::Gte, Operator::Lt]);
    }

    #[test]
    fn options_are_extracted() {
        let parsed =
            parse_filter(&json!({"slug": "x", "options": {"locale": "de-DE", "include": 1}}))
                .unwrap();
        assert_eq!(parsed.conditions.len(), 1);
        let options = parsed.options.unwrap();
        assert_eq!(options.locale.as_deref(), Some("de-DE"));
        assert_eq!(options.include, 1);
    }

    #[test]
    fn malformed_filters() {
        assert!(parse_filter(&json!(["slug"])).is_err());
        assert!(parse_filter(&json!({"slug": {}})).is_err());
        assert!(parse_filter(&json!({"a..b": 1})).is_err());
    }
}
