//! Query-string mini-language parsers, built with nom.
//!
//! # Filter syntax
//!
//! ```text
//! name=eq.project 1.5
//! ─┬── ┬ ┬ ────┬──────
//!  │   │ │     └── value: everything after the first '.' (may hold '.' or '=')
//!  │   │ └── operator: up to the first '.', no '=' allowed
//!  │   └── first '=' ends the column
//!  └── column
//! ```
//!
//! Repeated `filters=` query parameters are ANDed together.
//!
//! # Object syntax
//!
//! A `filters` entry that starts with `{` is read as a JSON object keyed by
//! column instead:
//!
//! ```text
//! {"age": {"op": "gte", "value": 18}, "name": {"op": {"literal": "LIKE"}, "value": "proj%"}}
//! ```
//!
//! `op` is either a token or a `{literal, sql}` pair where `literal` may be
//! a token or the SQL operator text. Array values join with `,` like an
//! `in.1,2,3` list. Columns come out in key order.

use nom::{
    bytes::complete::take_while1,
    character::complete::char,
    combinator::rest,
    sequence::{pair, separated_pair, terminated},
    IResult,
};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::ast::{Filter, Operator, OrderSpec, SortOrder};
use crate::error::{GateResult, TableGateError};

/// Parse one `column=operator.value` unit.
pub fn parse_filter(raw: &str) -> GateResult<Filter> {
    match filter_unit(raw) {
        Ok(("", (column, (token, value)))) => {
            let op = Operator::from_token(token)?;
            Ok(Filter::new(column, op, value))
        }
        _ => Err(TableGateError::filter_syntax(raw)),
    }
}

/// Parse a list of filter units, skipping blank entries.
///
/// Accepts anything iterable: `["a=eq.1"]`, a `Vec<String>`, or an
/// `Option<&str>` for a single optional value. Entries in the object syntax
/// may contribute several filters. Any bad unit aborts the whole parse.
pub fn parse_filters<I>(raw: I) -> GateResult<Vec<Filter>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut filters = Vec::new();
    for item in raw {
        let item: &str = item.as_ref();
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('{') {
            filters.extend(parse_filter_object(item)?);
        } else {
            filters.push(parse_filter(item)?);
        }
    }
    Ok(filters)
}

/// One column's entry in the object syntax.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectFilter {
    op: OperatorSpec,
    value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OperatorSpec {
    Token(String),
    Literal {
        literal: String,
        #[serde(default)]
        sql: Option<String>,
    },
}

impl OperatorSpec {
    fn resolve(&self) -> GateResult<Operator> {
        match self {
            OperatorSpec::Token(token) => Operator::from_token(token),
            OperatorSpec::Literal { literal, sql } => {
                let op = Operator::from_token(literal)
                    .or_else(|_| Operator::from_sql(literal))?;
                match sql {
                    Some(sql) if Operator::from_sql(sql).ok() != Some(op) => {
                        Err(TableGateError::UnknownOperator(sql.clone()))
                    }
                    _ => Ok(op),
                }
            }
        }
    }
}

/// Parse one object-syntax entry: `{"column": {"op": .., "value": ..}, ..}`.
pub fn parse_filter_object(raw: &str) -> GateResult<Vec<Filter>> {
    let entries: Map<String, Value> =
        serde_json::from_str(raw).map_err(|_| TableGateError::filter_syntax(raw))?;

    let mut filters = Vec::with_capacity(entries.len());
    for (column, entry) in entries {
        if column.is_empty() {
            return Err(TableGateError::filter_syntax(raw));
        }
        let entry: ObjectFilter =
            serde_json::from_value(entry).map_err(|_| TableGateError::filter_syntax(raw))?;
        let op = entry.op.resolve()?;
        let value = object_value(entry.value).ok_or_else(|| TableGateError::filter_syntax(raw))?;
        filters.push(Filter::new(column, op, value));
    }
    Ok(filters)
}

/// Scalars as their text; arrays of scalars comma-joined.
fn object_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Array(_) => None,
                other => object_value(other),
            })
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(",")),
        Value::Null | Value::Object(_) => None,
    }
}

/// column '=' operator '.' value
fn filter_unit(input: &str) -> IResult<&str, (&str, (&str, &str))> {
    separated_pair(column, char('='), operator_and_value)(input)
}

fn column(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != '=')(input)
}

fn operator_and_value(input: &str) -> IResult<&str, (&str, &str)> {
    pair(terminated(operator_token, char('.')), rest)(input)
}

fn operator_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != '=' && c != '.')(input)
}

/// Parse a `select=` value: comma-separated column names.
///
/// `*`, empty or blank means every column and yields an empty list.
pub fn parse_select_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" {
        return Vec::new();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an `order=` value: `col[.asc|.desc]`, comma-separated.
pub fn parse_order_list(raw: &str) -> Vec<OrderSpec> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_order_item)
        .collect()
}

fn parse_order_item(item: &str) -> OrderSpec {
    if let Some((ident, dir)) = item.rsplit_once('.') {
        let direction = if dir.eq_ignore_ascii_case("asc") {
            Some(SortOrder::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Some(SortOrder::Desc)
        } else {
            None
        };
        if direction.is_some() && !ident.is_empty() {
            return OrderSpec {
                identifier: ident.to_string(),
                direction,
            };
        }
    }
    OrderSpec::new(item)
}
