//! Request descriptors and compiled output.
//!
//! Everything here is a request-scoped value: built by the translator or the
//! parser, consumed by the [`Compiler`](crate::transpiler::Compiler), then
//! dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{GateResult, TableGateError};

/// Schema used when a request does not name one.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// A schema-qualified table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    /// Both parts must be non-empty.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> GateResult<Self> {
        let schema = schema.into();
        let name = name.into();
        if schema.is_empty() {
            return Err(TableGateError::shape("schema name is empty"));
        }
        if name.is_empty() {
            return Err(TableGateError::shape("table name is empty"));
        }
        Ok(Self { schema, name })
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Comparison operators accepted by the filter mini-language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Neq,
    /// Greater than (>)
    Gt,
    /// Less than (<)
    Lt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than or equal (<=)
    Lte,
    /// Pattern match (LIKE)
    Like,
    /// Negated pattern match (NOT LIKE)
    Nlike,
    /// Membership (IN)
    In,
    /// Negated membership (NOT IN)
    Nin,
}

impl Operator {
    /// Every operator, in reference order.
    pub const ALL: [Operator; 10] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Like,
        Operator::Nlike,
        Operator::In,
        Operator::Nin,
    ];

    /// The token used on the wire (`eq`, `neq`, ...).
    pub fn token(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Like => "like",
            Operator::Nlike => "nlike",
            Operator::In => "in",
            Operator::Nin => "nin",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One row predicate: `column <op> value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: Operator,
    pub value: String,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: Operator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
}

/// Renders the wire form `column=op.value`.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}.{}", self.column, self.op, self.value)
    }
}

/// Sort order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "ASC"),
            SortOrder::Desc => write!(f, "DESC"),
        }
    }
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub identifier: String,
    pub direction: Option<SortOrder>,
}

impl OrderSpec {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            direction: None,
        }
    }

    pub fn asc(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            direction: Some(SortOrder::Asc),
        }
    }

    pub fn desc(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            direction: Some(SortOrder::Desc),
        }
    }
}

/// Row window. `None` means unrestricted, not zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Pagination {
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self { limit, offset }
    }

    /// Offset that actually needs rendering; zero is the same as none.
    pub fn effective_offset(&self) -> Option<u64> {
        self.offset.filter(|n| *n > 0)
    }
}

/// A value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::Float(n) => write!(f, "{}", n),
            SqlValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl SqlValue {
    /// Read filter text as the narrowest literal it spells.
    ///
    /// `true`/`false` become booleans and plain decimals become numbers.
    /// Anything else, including numbers with a sign prefix or leading zeros,
    /// stays text.
    pub fn infer(text: &str) -> Self {
        match text {
            "true" => return SqlValue::Bool(true),
            "false" => return SqlValue::Bool(false),
            _ => {}
        }
        let digits = text.strip_prefix('-').unwrap_or(text);
        let plain = !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
            && digits.chars().filter(|c| *c == '.').count() <= 1
            && !digits.starts_with('.')
            && !digits.ends_with('.')
            && (digits == "0" || !digits.starts_with('0') || digits.starts_with("0."));
        if !plain {
            return SqlValue::String(text.to_string());
        }
        if !digits.contains('.') {
            if let Ok(n) = text.parse::<i64>() {
                return SqlValue::Int(n);
            }
        } else if let Ok(n) = text.parse::<f64>() {
            if n.is_finite() {
                return SqlValue::Float(n);
            }
        }
        SqlValue::String(text.to_string())
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Arrays and objects are bound as their JSON text.
impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::Float(f)
                } else {
                    SqlValue::String(n.to_string())
                }
            }
            serde_json::Value::String(s) => SqlValue::String(s),
            other => SqlValue::String(other.to_string()),
        }
    }
}

/// A bound parameter. `name` is only set under the named placeholder styles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<String>,
    pub value: SqlValue,
}

/// SQL text plus the parameters its placeholders refer to, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledStatement {
    pub text: String,
    pub params: Vec<Param>,
}

impl CompiledStatement {
    /// Parameter values in binding order.
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.params.iter().map(|p| &p.value)
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A declared routine parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineParam {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
}

impl RoutineParam {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A stored procedure or function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineRef {
    pub schema: String,
    pub name: String,
    pub params: Vec<RoutineParam>,
    pub return_type: String,
    pub is_function: bool,
}

impl RoutineRef {
    /// Table-valued functions are selected from rather than called.
    pub fn returns_table(&self) -> bool {
        self.is_function && self.return_type.eq_ignore_ascii_case("TABLE")
    }
}

/// A request to compile, one variant per statement kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Select(SelectRequest),
    Insert(InsertRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
    Call(RoutineCall),
}

impl Request {
    /// True when the statement produces rows rather than a row count.
    pub fn returns_rows(&self) -> bool {
        match self {
            Request::Select(_) => true,
            Request::Call(call) => call.routine.is_function,
            Request::Insert(_) | Request::Update(_) | Request::Delete(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub table: TableRef,
    pub filters: Vec<Filter>,
    /// Empty means `*`.
    pub select: Vec<String>,
    pub order: Vec<OrderSpec>,
    pub page: Pagination,
}

impl SelectRequest {
    /// `SELECT * FROM table` with nothing else.
    pub fn all(table: TableRef) -> Self {
        Self {
            table,
            filters: Vec::new(),
            select: Vec::new(),
            order: Vec::new(),
            page: Pagination::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertRequest {
    pub(crate) table: TableRef,
    pub(crate) columns: Vec<String>,
    pub(crate) values: Vec<SqlValue>,
}

impl InsertRequest {
    /// An empty column list inserts a row of defaults.
    pub fn new(table: TableRef, columns: Vec<String>, values: Vec<SqlValue>) -> GateResult<Self> {
        check_assignments("INSERT", &columns, &values)?;
        Ok(Self {
            table,
            columns,
            values,
        })
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub(crate) table: TableRef,
    pub(crate) columns: Vec<String>,
    pub(crate) values: Vec<SqlValue>,
    pub(crate) filters: Vec<Filter>,
}

impl UpdateRequest {
    pub fn new(
        table: TableRef,
        columns: Vec<String>,
        values: Vec<SqlValue>,
        filters: Vec<Filter>,
    ) -> GateResult<Self> {
        if columns.is_empty() {
            return Err(TableGateError::shape("UPDATE requires at least one column"));
        }
        check_assignments("UPDATE", &columns, &values)?;
        Ok(Self {
            table,
            columns,
            values,
            filters,
        })
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }
}

/// An empty filter list deletes every row; policy lives in the translator.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub table: TableRef,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineCall {
    pub(crate) routine: RoutineRef,
    pub(crate) args: Vec<SqlValue>,
}

impl RoutineCall {
    /// One argument per declared parameter.
    pub fn new(routine: RoutineRef, args: Vec<SqlValue>) -> GateResult<Self> {
        if args.len() != routine.params.len() {
            return Err(TableGateError::shape(format!(
                "routine '{}' takes {} argument(s), got {}",
                routine.name,
                routine.params.len(),
                args.len()
            )));
        }
        // `@year` and `year` name the same parameter
        let mut seen = HashSet::new();
        for param in &routine.params {
            if !seen.insert(param.name.trim_start_matches(['@', ':'])) {
                return Err(TableGateError::shape(format!(
                    "routine '{}' declares parameter '{}' more than once",
                    routine.name, param.name
                )));
            }
        }
        Ok(Self { routine, args })
    }

    pub fn routine(&self) -> &RoutineRef {
        &self.routine
    }
}

fn check_assignments(kind: &str, columns: &[String], values: &[SqlValue]) -> GateResult<()> {
    if columns.len() != values.len() {
        return Err(TableGateError::shape(format!(
            "{} has {} column(s) but {} value(s)",
            kind,
            columns.len(),
            values.len()
        )));
    }
    let mut seen = HashSet::new();
    for col in columns {
        if col.is_empty() {
            return Err(TableGateError::shape(format!("{} column name is empty", kind)));
        }
        if !seen.insert(col.as_str()) {
            return Err(TableGateError::shape(format!(
                "{} names column '{}' more than once",
                kind, col
            )));
        }
    }
    Ok(())
}
