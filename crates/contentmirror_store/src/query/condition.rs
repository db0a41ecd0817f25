//! Filter conditions.

use super::path::FieldPath;
use crate::error::{StoreError, StoreResult};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Value is one of a list.
    In,
    /// Value is none of a list.
    Nin,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Field is (or is not) present.
    Exists,
}

impl Operator {
    /// Every operator.
    pub const ALL: [Operator; 9] = [
        Operator::Eq,
        Operator::Ne,
        Operator::In,
        Operator::Nin,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Exists,
    ];

    /// Parses an operator name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Returns the operator name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Exists => "exists",
        }
    }

    /// Returns true for `lt`, `lte`, `gt` and `gte`.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized `(path, operator, value)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    path: FieldPath,
    operator: Operator,
    expected: Value,
}

impl Condition {
    /// Creates a condition, checking that `expected` fits `operator`.
    ///
    /// `in` and `nin` accept a scalar as a one-element list.
    pub fn new(path: FieldPath, operator: Operator, expected: Value) -> StoreResult<Self> {
        let expected = match (operator, expected) {
            (Operator::In | Operator::Nin, Value::Array(values)) => Value::Array(values),
            (Operator::In | Operator::Nin, scalar) => Value::Array(vec![scalar]),
            (Operator::Exists, Value::Bool(b)) => Value::Bool(b),
            (Operator::Exists, other) => {
                return Err(StoreError::invalid_query(format!(
                    "`exists` expects a boolean, got {other}"
                )))
            }
            (op, value @ (Value::Number(_) | Value::String(_))) if op.is_range() => value,
            (op, other) if op.is_range() => {
                return Err(StoreError::invalid_query(format!(
                    "`{op}` expects a number or string, got {other}"
                )))
            }
            (_, value) => value,
        };
        let scalars = match &expected {
            Value::Array(values) if matches!(operator, Operator::In | Operator::Nin) => {
                values.iter().all(is_scalar)
            }
            value => is_scalar(value),
        };
        if !scalars {
            return Err(StoreError::invalid_query(format!(
                "`{operator}` expects scalar values, got {expected}"
            )));
        }
        Ok(Self {
            path,
            operator,
            expected,
        })
    }

    /// Returns the normalized path.
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Returns the operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns the expected value. Always an array for `in`/`nin`.
    pub fn expected(&self) -> &Value {
        &self.expected
    }

    /// Returns the expected list of `in`/`nin`.
    pub fn expected_list(&self) -> &[Value] {
        self.expected.as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the expected flag of `exists`.
    pub fn expects_presence(&self) -> bool {
        self.expected.as_bool().unwrap_or(true)
    }

    /// Evaluates the condition over the values found at the path.
    ///
    /// Arrays are flattened by the caller; a condition holds when any value
    /// matches (`ne` and `nin` when none does).
    pub fn test(&self, candidates: &[Value]) -> bool {
        match self.operator {
            Operator::Eq => candidates.iter().any(|c| json_eq(c, &self.expected)),
            Operator::Ne => !candidates.iter().any(|c| json_eq(c, &self.expected)),
            Operator::In => candidates
                .iter()
                .any(|c| self.expected_list().iter().any(|e| json_eq(c, e))),
            Operator::Nin => !candidates
                .iter()
                .any(|c| self.expected_list().iter().any(|e| json_eq(c, e))),
            Operator::Lt => self.any_ordered(candidates, |o| o == Ordering::Less),
            Operator::Lte => self.any_ordered(candidates, |o| o != Ordering::Greater),
            Operator::Gt => self.any_ordered(candidates, |o| o == Ordering::Greater),
            Operator::Gte => self.any_ordered(candidates, |o| o != Ordering::Less),
            Operator::Exists => !candidates.is_empty() == self.expects_presence(),
        }
    }

    fn any_ordered(&self, candidates: &[Value], accept: impl Fn(Ordering) -> bool) -> bool {
        candidates
            .iter()
            .filter_map(|c| json_cmp(c, &self.expected))
            .any(accept)
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Compares JSON values, treating numbers by numeric value.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Orders numbers numerically and strings lexically. Mixed types are unordered.
fn json_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
