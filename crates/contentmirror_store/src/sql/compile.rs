//! Compiles a [`QuerySpec`] into SQLite SQL over the JSON record bodies.
//!
//! Every caller-derived string (content type, field paths, values) is bound
//! as a parameter. Only whitelisted `sys` attribute names are inlined.
//! Comparisons check the JSON type of the stored value first, so `true`
//! never equals `1` and numbers never order against strings.

use crate::query::{Condition, Operator, QuerySpec, Scope, Segment};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// SQL text and its positional parameters, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledQuery {
    /// `SELECT t0.body ... ORDER BY t0.id LIMIT ? OFFSET ?`
    pub select_sql: String,
    /// `SELECT COUNT(*) ...` over the same conditions.
    pub count_sql: String,
    /// Parameters of the shared `WHERE` clause.
    pub params: Vec<SqlValue>,
    /// Parameters for `LIMIT` and `OFFSET`.
    pub page: [SqlValue; 2],
}

pub(crate) fn compile(spec: &QuerySpec) -> CompiledQuery {
    let mut b = SqlBuilder::default();
    b.push("t0.content_type = ");
    b.bind(SqlValue::Text(spec.content_type.clone()));
    b.push(" AND t0.kind IN ('Entry', 'Asset')");
    for condition in &spec.conditions {
        b.push(" AND ");
        emit_condition(&mut b, condition);
    }

    let limit = spec
        .options
        .limit
        .and_then(|l| i64::try_from(l).ok())
        .unwrap_or(-1);
    let skip = i64::try_from(spec.options.skip).unwrap_or(i64::MAX);

    CompiledQuery {
        select_sql: format!(
            "SELECT t0.body FROM records t0 WHERE {} ORDER BY t0.id LIMIT ? OFFSET ?",
            b.sql
        ),
        count_sql: format!("SELECT COUNT(*) FROM records t0 WHERE {}", b.sql),
        params: b.params,
        page: [SqlValue::Integer(limit), SqlValue::Integer(skip)],
    }
}

#[derive(Debug, Default)]
struct SqlBuilder {
    sql: String,
    params: Vec<SqlValue>,
    aliases: usize,
}

impl SqlBuilder {
    fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    fn bind(&mut self, value: SqlValue) {
        self.sql.push('?');
        self.params.push(value);
    }

    fn alias(&mut self, prefix: &str) -> String {
        self.aliases += 1;
        format!("{prefix}{}", self.aliases)
    }
}

/// A value under test.
enum Operand<'a> {
    /// Parameter-free expressions for the value and its JSON type name.
    Expr { value: String, json_type: String },
    /// The id of a single link held at a field path.
    LinkId { alias: &'a str, link: &'a Segment },
}

impl Operand<'_> {
    fn element(je: &str) -> Self {
        Operand::Expr {
            value: format!("{je}.value"),
            json_type: format!("{je}.type"),
        }
    }

    fn element_link_id(je: &str) -> Self {
        Operand::Expr {
            value: format!("json_extract({je}.value, '$.sys.id')"),
            json_type: format!("json_type({je}.value, '$.sys.id')"),
        }
    }

    fn sys(alias: &str, attribute: &str) -> Self {
        match attribute {
            "id" | "contentType" => {
                let column = if attribute == "id" { "id" } else { "content_type" };
                Operand::Expr {
                    value: format!("{alias}.{column}"),
                    json_type: format!("json_type(json_quote({alias}.{column}))"),
                }
            }
            other => Operand::Expr {
                value: format!("json_extract({alias}.body, '$.sys.{other}')"),
                json_type: format!("json_type({alias}.body, '$.sys.{other}')"),
            },
        }
    }

    fn emit_value(&self, b: &mut SqlBuilder) {
        self.emit("json_extract", b);
    }

    fn emit_type(&self, b: &mut SqlBuilder) {
        self.emit("json_type", b);
    }

    fn emit(&self, function: &str, b: &mut SqlBuilder) {
        match self {
            Operand::Expr { value, json_type } => {
                b.push(if function == "json_type" { json_type } else { value });
            }
            Operand::LinkId { alias, link } => {
                b.push(&format!("{function}({alias}.body, "));
                emit_field_path(b, alias, link);
                b.push(" || '.sys.id')");
            }
        }
    }
}

/// Maps a negative operator to its positive form and whether to negate.
fn positive(condition: &Condition) -> (Operator, bool) {
    match condition.operator() {
        Operator::Ne => (Operator::Eq, true),
        Operator::Nin => (Operator::In, true),
        Operator::Exists if !condition.expects_presence() => (Operator::Exists, true),
        op => (op, false),
    }
}

fn emit_condition(b: &mut SqlBuilder, condition: &Condition) {
    let (op, negate) = positive(condition);
    let expected = condition.expected();
    let path = condition.path();

    if negate {
        b.push("NOT ");
    }
    b.push("(");
    match path.joined() {
        None => emit_direct(b, "t0", path.head(), op, expected),
        Some(target) if target.is_sys_id() => emit_link_ids(b, "t0", path.head(), op, expected),
        Some(target) => emit_join(b, "t0", path.head(), target, op, expected),
    }
    b.push(")");
}

fn emit_direct(b: &mut SqlBuilder, alias: &str, segment: &Segment, op: Operator, expected: &Value) {
    match segment.scope {
        Scope::Fields => {
            let je = b.alias("je");
            b.push(&format!("EXISTS (SELECT 1 FROM json_each({alias}.body, "));
            emit_field_path(b, alias, segment);
            b.push(&format!(") {je} WHERE "));
            emit_test(b, op, expected, &Operand::element(&je));
            b.push(")");
        }
        Scope::Sys => {
            b.push("EXISTS (SELECT 1 WHERE ");
            emit_test(b, op, expected, &Operand::sys(alias, &segment.name));
            b.push(")");
        }
    }
}

/// Tests the ids of the links held at `link`, without loading the targets.
fn emit_link_ids(b: &mut SqlBuilder, alias: &str, link: &Segment, op: Operator, expected: &Value) {
    b.push("EXISTS (SELECT 1 WHERE ");
    emit_test(b, op, expected, &Operand::LinkId { alias, link });
    let je = b.alias("je");
    b.push(&format!(") OR EXISTS (SELECT 1 FROM json_each({alias}.body, "));
    emit_field_path(b, alias, link);
    b.push(&format!(") {je} WHERE {je}.type = 'object' AND "));
    emit_test(b, op, expected, &Operand::element_link_id(&je));
    b.push(")");
}

fn emit_join(
    b: &mut SqlBuilder,
    alias: &str,
    link: &Segment,
    target: &Segment,
    op: Operator,
    expected: &Value,
) {
    let j = b.alias("j");
    match target.scope {
        Scope::Fields => {
            let je = b.alias("je");
            b.push(&format!("EXISTS (SELECT 1 FROM records {j}, json_each({j}.body, "));
            emit_field_path(b, &j, target);
            b.push(&format!(") {je} WHERE {j}.id IN ("));
            emit_link_id_set(b, alias, link);
            b.push(") AND ");
            emit_test(b, op, expected, &Operand::element(&je));
        }
        Scope::Sys => {
            b.push(&format!("EXISTS (SELECT 1 FROM records {j} WHERE {j}.id IN ("));
            emit_link_id_set(b, alias, link);
            b.push(") AND ");
            emit_test(b, op, expected, &Operand::sys(&j, &target.name));
        }
    }
    b.push(")");
}

/// Ids of a single link or of every link in an array.
fn emit_link_id_set(b: &mut SqlBuilder, alias: &str, link: &Segment) {
    b.push("SELECT ");
    Operand::LinkId { alias, link }.emit_value(b);
    let je = b.alias("je");
    b.push(&format!(
        " UNION ALL SELECT json_extract({je}.value, '$.sys.id') FROM json_each({alias}.body, "
    ));
    emit_field_path(b, alias, link);
    b.push(&format!(") {je} WHERE {je}.type = 'object'"));
}

/// Emits the JSON path of a field, picking the first locale present.
///
/// Single-locale records keep values directly under the field name.
fn emit_field_path(b: &mut SqlBuilder, alias: &str, segment: &Segment) {
    b.push(&format!(
        "(CASE WHEN json_type({alias}.body, '$.sys.locale') IS NOT NULL THEN "
    ));
    b.bind(SqlValue::Text(field_json_path(&segment.name, None)));
    for locale in &segment.locales {
        let path = field_json_path(&segment.name, Some(locale));
        b.push(&format!(" WHEN json_type({alias}.body, "));
        b.bind(SqlValue::Text(path.clone()));
        b.push(") IS NOT NULL THEN ");
        b.bind(SqlValue::Text(path));
    }
    b.push(" ELSE ");
    b.bind(SqlValue::Text(field_json_path(&segment.name, segment.locale())));
    b.push(" END)");
}

fn field_json_path(name: &str, locale: Option<&str>) -> String {
    match locale {
        Some(locale) => format!("$.fields.\"{name}\".\"{locale}\""),
        None => format!("$.fields.\"{name}\""),
    }
}

fn emit_test(b: &mut SqlBuilder, op: Operator, expected: &Value, operand: &Operand<'_>) {
    match op {
        Operator::Eq | Operator::Ne => emit_equals(b, expected, operand),
        Operator::In | Operator::Nin => {
            let list = expected.as_array().map(Vec::as_slice).unwrap_or(&[]);
            if list.is_empty() {
                b.push("0");
                return;
            }
            b.push("(");
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    b.push(" OR ");
                }
                emit_equals(b, item, operand);
            }
            b.push(")");
        }
        Operator::Exists => {
            operand.emit_value(b);
            b.push(" IS NOT NULL");
        }
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            b.push("(");
            emit_type_guard(b, expected, operand);
            b.push(" AND ");
            operand.emit_value(b);
            b.push(match op {
                Operator::Lt => " < ",
                Operator::Lte => " <= ",
                Operator::Gt => " > ",
                _ => " >= ",
            });
            b.bind(to_sql(expected));
            b.push(")");
        }
    }
}

fn emit_equals(b: &mut SqlBuilder, expected: &Value, operand: &Operand<'_>) {
    match expected {
        Value::Bool(flag) => {
            operand.emit_type(b);
            b.push(if *flag { " = 'true'" } else { " = 'false'" });
        }
        Value::Number(_) | Value::String(_) => {
            b.push("(");
            emit_type_guard(b, expected, operand);
            b.push(" AND ");
            operand.emit_value(b);
            b.push(" = ");
            b.bind(to_sql(expected));
            b.push(")");
        }
        _ => b.push("0"),
    }
}

fn emit_type_guard(b: &mut SqlBuilder, expected: &Value, operand: &Operand<'_>) {
    operand.emit_type(b);
    b.push(if expected.is_string() {
        " = 'text'"
    } else {
        " IN ('integer', 'real')"
    });
}

/// Converts a JSON scalar into the value SQLite's JSON functions produce.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
