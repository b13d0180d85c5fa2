//! Request translation: HTTP-shaped input to request descriptors.
//!
//! The translator reads the table from the path, the `select`, `order`,
//! `filters` (string or object syntax), `limit` and `offset` keys from the
//! query string, and column
//! values from JSON bodies. It applies the server-side policies (default row
//! cap, filter requirement for writes) and leaves SQL generation to the
//! [`Compiler`].

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::ast::*;
use crate::config::AppConfig;
use crate::error::{GateResult, TableGateError};
use crate::parser::{parse_filters, parse_order_list, parse_select_list};
use crate::transpiler::Compiler;

/// Policies applied on top of the raw request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Limit used when a read does not specify one.
    pub default_limit: Option<u64>,
    /// Allow UPDATE/DELETE without filters.
    pub allow_unfiltered_writes: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            default_limit: Some(1000),
            allow_unfiltered_writes: false,
        }
    }
}

impl From<&AppConfig> for TranslateOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_limit: config.default_limit(),
            allow_unfiltered_writes: config.allow_unfiltered_writes,
        }
    }
}

/// The recognised query-string keys, collected from raw pairs.
///
/// `filters` may repeat; for the other keys the last occurrence wins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub select: Option<String>,
    pub order: Option<String>,
    pub filters: Vec<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl QueryParams {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = QueryParams::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "select" => params.select = Some(value.into()),
                "order" => params.order = Some(value.into()),
                "filters" => params.filters.push(value.into()),
                "limit" => params.limit = Some(value.into()),
                "offset" => params.offset = Some(value.into()),
                other => tracing::debug!("ignoring query parameter '{}'", other),
            }
        }
        params
    }
}

/// Body of `POST /rpc/{routine}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutineBody {
    #[serde(default)]
    pub schema: Option<String>,
    /// `false` for stored procedures.
    #[serde(default)]
    pub function: bool,
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default)]
    pub args: Vec<RoutineArg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutineArg {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub value: Value,
}

/// Builds request descriptors and compiles them.
#[derive(Debug, Default)]
pub struct Translator {
    compiler: Compiler,
    options: TranslateOptions,
}

impl Translator {
    pub fn new(compiler: Compiler, options: TranslateOptions) -> Self {
        Self { compiler, options }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    /// `GET /{table}`
    pub fn read(&self, table: &str, query: &QueryParams) -> GateResult<Request> {
        let table = self.compiler.table(table)?;
        let filters = parse_filters(&query.filters)?;
        let select = query.select.as_deref().map(parse_select_list).unwrap_or_default();
        let order = query.order.as_deref().map(parse_order_list).unwrap_or_default();
        let limit = parse_count("limit", query.limit.as_deref())?.or(self.options.default_limit);
        let offset = parse_count("offset", query.offset.as_deref())?;

        Ok(Request::Select(SelectRequest {
            table,
            filters,
            select,
            order,
            page: Pagination::new(limit, offset),
        }))
    }

    /// `POST /{table}`; `{}` inserts a row of defaults.
    pub fn insert(&self, table: &str, body: Value) -> GateResult<Request> {
        let table = self.compiler.table(table)?;
        let (columns, values) = split_row(body)?;
        Ok(Request::Insert(InsertRequest::new(table, columns, values)?))
    }

    /// `PATCH /{table}` and `PUT /{table}`
    pub fn update(&self, table: &str, query: &QueryParams, body: Value) -> GateResult<Request> {
        let table = self.compiler.table(table)?;
        let filters = self.write_filters("UPDATE", query)?;
        let (columns, values) = split_row(body)?;
        if columns.is_empty() {
            return Err(TableGateError::InvalidBody(
                "UPDATE body must set at least one column".to_string(),
            ));
        }
        Ok(Request::Update(UpdateRequest::new(
            table, columns, values, filters,
        )?))
    }

    /// `DELETE /{table}`
    pub fn delete(&self, table: &str, query: &QueryParams) -> GateResult<Request> {
        let table = self.compiler.table(table)?;
        let filters = self.write_filters("DELETE", query)?;
        Ok(Request::Delete(DeleteRequest { table, filters }))
    }

    /// `POST /rpc/{routine}`
    pub fn call(&self, routine: &str, body: RoutineBody) -> GateResult<Request> {
        if routine.is_empty() {
            return Err(TableGateError::shape("routine name is empty"));
        }
        let schema = body
            .schema
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.compiler.config().default_schema.clone());

        let (params, args): (Vec<_>, Vec<_>) = body
            .args
            .into_iter()
            .map(|arg| {
                (
                    RoutineParam::new(arg.name, arg.data_type),
                    SqlValue::from(arg.value),
                )
            })
            .unzip();

        let routine = RoutineRef {
            schema,
            name: routine.to_string(),
            params,
            return_type: body.returns.unwrap_or_default(),
            is_function: body.function,
        };
        Ok(Request::Call(RoutineCall::new(routine, args)?))
    }

    pub fn compile(&self, request: &Request) -> GateResult<CompiledStatement> {
        self.compiler.compile(request)
    }

    fn write_filters(&self, kind: &str, query: &QueryParams) -> GateResult<Vec<Filter>> {
        let filters = parse_filters(&query.filters)?;
        if filters.is_empty() && !self.options.allow_unfiltered_writes {
            return Err(TableGateError::shape(format!(
                "{} without filters would touch every row",
                kind
            )));
        }
        Ok(filters)
    }
}

/// Blank counts are treated as absent.
fn parse_count(name: &str, raw: Option<&str>) -> GateResult<Option<u64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| TableGateError::parameter(name, text)),
    }
}

/// JSON object → ordered columns and values.
fn split_row(body: Value) -> GateResult<(Vec<String>, Vec<SqlValue>)> {
    let object: Map<String, Value> = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(TableGateError::InvalidBody(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )));
        }
    };
    Ok(object
        .into_iter()
        .map(|(column, value)| (column, SqlValue::from(value)))
        .unzip())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn query(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(pairs.iter().copied())
    }

    fn sql(translator: &Translator, request: GateResult<Request>) -> String {
        translator.compile(&request.unwrap()).unwrap().text
    }

    #[test]
    fn test_query_params_collects_repeated_filters() {
        let q = query(&[
            ("filters", "a=eq.1"),
            ("limit", "5"),
            ("filters", "b=lt.2"),
            ("callback", "x"),
        ]);
        assert_eq!(q.filters, vec!["a=eq.1", "b=lt.2"]);
        assert_eq!(q.limit.as_deref(), Some("5"));
    }

    #[test]
    fn test_read_applies_default_limit() {
        let t = Translator::default();
        assert_eq!(
            sql(&t, t.read("projects", &query(&[]))),
            "SELECT * FROM [dbo].[projects] LIMIT 1000"
        );
    }

    #[test]
    fn test_read_explicit_limit_and_no_default() {
        let t = Translator::new(
            Compiler::default(),
            TranslateOptions {
                default_limit: None,
                ..TranslateOptions::default()
            },
        );
        assert_eq!(
            sql(&t, t.read("projects", &query(&[]))),
            "SELECT * FROM [dbo].[projects]"
        );
        assert_eq!(
            sql(
                &t,
                t.read(
                    "projects",
                    &query(&[
                        ("select", "id,name"),
                        ("order", "name"),
                        ("limit", "10"),
                        ("offset", "0"),
                    ])
                )
            ),
            "SELECT [id], [name] FROM [dbo].[projects] ORDER BY [name] LIMIT 10"
        );
    }

    #[test]
    fn test_read_rejects_bad_counts() {
        let t = Translator::default();
        let err = t.read("projects", &query(&[("limit", "ten")])).unwrap_err();
        assert!(matches!(
            err,
            TableGateError::InvalidParameter { ref name, .. } if name == "limit"
        ));
        let err = t.read("projects", &query(&[("offset", "-1")])).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_read_propagates_filter_errors() {
        let t = Translator::default();
        let err = t
            .read("projects", &query(&[("filters", "bad-filter-no-dot")]))
            .unwrap_err();
        assert!(matches!(err, TableGateError::FilterSyntax { .. }));
    }

    #[test]
    fn test_object_filters_reach_every_statement() {
        let t = Translator::default();
        let object = r#"{"id": {"op": {"literal": "=", "sql": "="}, "value": 5}}"#;

        assert_eq!(
            sql(&t, t.read("projects", &query(&[("filters", object), ("filters", "name=neq.x")]))),
            "SELECT * FROM [dbo].[projects] WHERE [id] = ? AND [name] <> ? LIMIT 1000"
        );
        assert_eq!(
            sql(&t, t.delete("projects", &query(&[("filters", object)]))),
            "DELETE FROM [dbo].[projects] WHERE [id] = ?"
        );
        assert_eq!(
            sql(&t, t.update("projects", &query(&[("filters", object)]), json!({"name": "y"}))),
            "UPDATE [dbo].[projects] SET [name] = ? WHERE [id] = ?"
        );

        // An empty object is no filter at all
        let err = t.delete("projects", &query(&[("filters", "{}")])).unwrap_err();
        assert!(matches!(err, TableGateError::InvalidShape(_)));
    }

    #[test]
    fn test_empty_table_name() {
        let t = Translator::default();
        assert!(t.read("", &query(&[])).is_err());
    }

    #[test]
    fn test_insert_from_body() {
        let t = Translator::default();
        let request = t
            .insert("projects", json!({"id": 1, "name": "project1"}))
            .unwrap();
        let stmt = t.compile(&request).unwrap();
        assert_eq!(
            stmt.text,
            "INSERT INTO [dbo].[projects] ([id], [name]) VALUES (?, ?)"
        );
        let values: Vec<_> = stmt.values().cloned().collect();
        assert_eq!(values, vec![SqlValue::Int(1), SqlValue::from("project1")]);
    }

    #[test]
    fn test_insert_empty_body_uses_defaults() {
        let t = Translator::default();
        assert_eq!(
            sql(&t, t.insert("projects", json!({}))),
            "INSERT INTO [dbo].[projects] DEFAULT VALUES"
        );
    }

    #[test]
    fn test_insert_rejects_non_object() {
        let t = Translator::default();
        let err = t.insert("projects", json!([1, 2])).unwrap_err();
        assert!(matches!(err, TableGateError::InvalidBody(_)));
    }

    #[test]
    fn test_update_requires_filters_by_default() {
        let t = Translator::default();
        let err = t
            .update("projects", &query(&[]), json!({"name": "x"}))
            .unwrap_err();
        assert!(matches!(err, TableGateError::InvalidShape(_)));

        assert_eq!(
            sql(
                &t,
                t.update("projects", &query(&[("filters", "id=eq.5")]), json!({"name": "x"}))
            ),
            "UPDATE [dbo].[projects] SET [name] = ? WHERE [id] = ?"
        );
    }

    #[test]
    fn test_update_requires_columns() {
        let t = Translator::default();
        let err = t
            .update("projects", &query(&[("filters", "id=eq.5")]), json!({}))
            .unwrap_err();
        assert!(matches!(err, TableGateError::InvalidBody(_)));
    }

    #[test]
    fn test_unfiltered_delete_when_allowed() {
        let strict = Translator::default();
        assert!(strict.delete("projects", &query(&[])).is_err());

        let lax = Translator::new(
            Compiler::default(),
            TranslateOptions {
                allow_unfiltered_writes: true,
                ..TranslateOptions::default()
            },
        );
        assert_eq!(
            sql(&lax, lax.delete("projects", &query(&[]))),
            "DELETE FROM [dbo].[projects]"
        );
    }

    #[test]
    fn test_call_table_function() {
        let t = Translator::default();
        let body: RoutineBody = serde_json::from_value(json!({
            "function": true,
            "returns": "TABLE",
            "args": [{"name": "year", "type": "int", "value": 2024}]
        }))
        .unwrap();
        let request = t.call("getTotals", body).unwrap();
        assert!(request.returns_rows());
        let stmt = t.compile(&request).unwrap();
        assert_eq!(stmt.text, "SELECT * FROM [dbo].[getTotals]( ? )");
        assert_eq!(stmt.params[0].value, SqlValue::Int(2024));
    }

    #[test]
    fn test_call_procedure_in_schema() {
        let t = Translator::default();
        let body: RoutineBody =
            serde_json::from_value(json!({"schema": "ops", "args": []})).unwrap();
        let request = t.call("rebuild", body).unwrap();
        assert!(!request.returns_rows());
        assert_eq!(sql(&t, Ok(request)), "{call [ops].[rebuild]()}");
    }

    #[test]
    fn test_call_rejects_duplicate_argument_names() {
        let t = Translator::default();
        let body: RoutineBody = serde_json::from_value(json!({
            "args": [{"name": "x", "value": 1}, {"name": "x", "value": 2}]
        }))
        .unwrap();
        assert!(t.call("p", body).is_err());
    }
}
