//! SQL statement assembly.
//!
//! Turns request descriptors into [`CompiledStatement`]s. Every name goes
//! through the dialect's identifier quoting and every value becomes a bound
//! parameter; nothing supplied by a request is spliced into the text as-is.
//!
//! ```
//! use tablegate::prelude::*;
//!
//! let compiler = Compiler::default();
//! let table = compiler.table("projects").unwrap();
//! let filters = parse_filters(["id=eq.5"]).unwrap();
//! let stmt = compiler
//!     .compile_delete(&DeleteRequest { table, filters })
//!     .unwrap();
//! assert_eq!(stmt.text, "DELETE FROM [dbo].[projects] WHERE [id] = ?");
//! ```

pub mod dialect;
pub mod operators;

pub use dialect::{Dialect, PaginationStyle, PlaceholderStyle, SqlGenerator};
pub use operators::resolve;

use std::collections::HashSet;

use crate::ast::*;
use crate::config::CompilerConfig;
use crate::error::{GateResult, TableGateError};

/// Compiles request descriptors under one fixed dialect configuration.
///
/// Holds no per-request state; share it freely across threads.
pub struct Compiler {
    config: CompilerConfig,
    generator: Box<dyn SqlGenerator + Send + Sync>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler").field("config", &self.config).finish()
    }
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let generator = config.dialect.generator();
        Self { config, generator }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Quote one identifier for this dialect.
    pub fn quote(&self, name: &str) -> String {
        self.generator.quote_identifier(name)
    }

    /// A table in the configured default schema.
    pub fn table(&self, name: &str) -> GateResult<TableRef> {
        TableRef::new(self.config.default_schema.clone(), name)
    }

    pub fn compile(&self, request: &Request) -> GateResult<CompiledStatement> {
        match request {
            Request::Select(req) => self.compile_select(req),
            Request::Insert(req) => self.compile_insert(req),
            Request::Update(req) => self.compile_update(req),
            Request::Delete(req) => self.compile_delete(req),
            Request::Call(req) => self.compile_routine_call(req),
        }
    }

    /// Generate SELECT SQL.
    pub fn compile_select(&self, req: &SelectRequest) -> GateResult<CompiledStatement> {
        let mut binder = self.binder();
        let limit = req.page.limit;
        let offset = req.page.effective_offset();
        let style = self.config.pagination;

        let mut sql = String::from("SELECT ");

        if style == PaginationStyle::Top {
            if let Some(n) = offset {
                return Err(TableGateError::shape(format!(
                    "offset {} cannot be expressed with TOP pagination",
                    n
                )));
            }
            if let Some(n) = limit {
                sql.push_str(&format!("TOP ({}) ", n));
            }
        }

        // Columns
        if req.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.quote_list(&req.select));
        }

        // FROM
        sql.push_str(" FROM ");
        sql.push_str(&self.quote_table(&req.table));

        // WHERE
        sql.push_str(&self.where_clause(&req.filters, &mut binder));

        // ORDER BY
        if !req.order.is_empty() {
            let items: Vec<String> = req
                .order
                .iter()
                .map(|o| match o.direction {
                    Some(dir) => format!("{} {}", self.quote(&o.identifier), dir),
                    None => self.quote(&o.identifier),
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }

        // Pagination
        match style {
            PaginationStyle::LimitOffset => {
                if let Some(n) = limit {
                    sql.push_str(&format!(" LIMIT {}", n));
                }
                if let Some(n) = offset {
                    sql.push_str(&format!(" OFFSET {}", n));
                }
            }
            PaginationStyle::OffsetFetch => {
                if limit.is_some() || offset.is_some() {
                    // OFFSET/FETCH is only legal after an ORDER BY
                    if req.order.is_empty() {
                        sql.push_str(" ORDER BY (SELECT NULL)");
                    }
                    sql.push_str(&format!(" OFFSET {} ROWS", offset.unwrap_or(0)));
                    if let Some(n) = limit {
                        sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", n));
                    }
                }
            }
            PaginationStyle::Top => {}
        }

        Ok(binder.finish(sql))
    }

    /// Generate INSERT SQL.
    pub fn compile_insert(&self, req: &InsertRequest) -> GateResult<CompiledStatement> {
        let mut binder = self.binder();
        let mut sql = String::from("INSERT INTO ");
        sql.push_str(&self.quote_table(&req.table));

        if req.columns.is_empty() {
            sql.push_str(" DEFAULT VALUES");
            return Ok(binder.finish(sql));
        }

        let placeholders: Vec<String> = req
            .columns
            .iter()
            .zip(&req.values)
            .map(|(col, val)| binder.bind(&format!("v_{}", col), val.clone()))
            .collect();

        sql.push_str(" (");
        sql.push_str(&self.quote_list(&req.columns));
        sql.push_str(") VALUES (");
        sql.push_str(&placeholders.join(", "));
        sql.push(')');

        Ok(binder.finish(sql))
    }

    /// Generate UPDATE SQL. SET parameters precede WHERE parameters.
    pub fn compile_update(&self, req: &UpdateRequest) -> GateResult<CompiledStatement> {
        if req.columns.is_empty() {
            return Err(TableGateError::shape("UPDATE requires at least one column"));
        }
        let mut binder = self.binder();
        let mut sql = String::from("UPDATE ");
        sql.push_str(&self.quote_table(&req.table));

        let assignments: Vec<String> = req
            .columns
            .iter()
            .zip(&req.values)
            .map(|(col, val)| {
                let ph = binder.bind(&format!("v_{}", col), val.clone());
                format!("{} = {}", self.quote(col), ph)
            })
            .collect();

        sql.push_str(" SET ");
        sql.push_str(&assignments.join(", "));
        sql.push_str(&self.where_clause(&req.filters, &mut binder));

        Ok(binder.finish(sql))
    }

    /// Generate DELETE SQL.
    pub fn compile_delete(&self, req: &DeleteRequest) -> GateResult<CompiledStatement> {
        let mut binder = self.binder();
        let mut sql = String::from("DELETE FROM ");
        sql.push_str(&self.quote_table(&req.table));
        sql.push_str(&self.where_clause(&req.filters, &mut binder));
        Ok(binder.finish(sql))
    }

    /// Generate the invocation for a function or stored procedure.
    pub fn compile_routine_call(&self, call: &RoutineCall) -> GateResult<CompiledStatement> {
        let mut binder = self.binder();
        let routine = &call.routine;
        let name = format!(
            "{}.{}",
            self.quote(&routine.schema),
            self.quote(&routine.name)
        );

        let placeholders: Vec<String> = routine
            .params
            .iter()
            .zip(&call.args)
            .map(|(param, arg)| binder.bind(&param.name, arg.clone()))
            .collect();
        let args = if placeholders.is_empty() {
            "()".to_string()
        } else {
            format!("( {} )", placeholders.join(", "))
        };

        let sql = if !routine.is_function {
            format!("{{call {}{}}}", name, args)
        } else if routine.returns_table() {
            format!("SELECT * FROM {}{}", name, args)
        } else {
            format!("SELECT {}{}", name, args)
        };

        Ok(binder.finish(sql))
    }

    fn binder(&self) -> Binder {
        Binder {
            style: self.config.placeholders,
            params: Vec::new(),
            names: HashSet::new(),
        }
    }

    fn quote_table(&self, table: &TableRef) -> String {
        format!("{}.{}", self.quote(&table.schema), self.quote(&table.name))
    }

    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Empty filter list → empty string, never a bare `WHERE`.
    fn where_clause(&self, filters: &[Filter], binder: &mut Binder) -> String {
        if filters.is_empty() {
            return String::new();
        }

        let mut predicates = Vec::with_capacity(filters.len());
        for (i, filter) in filters.iter().enumerate() {
            let col = self.quote(&filter.column);
            let ph = binder.bind(&format!("f{}_{}", i, filter.column), self.filter_value(filter));
            if filter.op.is_membership() {
                predicates.push(format!("{} {} ({})", col, filter.op.sql(), ph));
            } else {
                predicates.push(format!("{} {} {}", col, filter.op.sql(), ph));
            }
        }

        format!(" WHERE {}", predicates.join(" AND "))
    }

    /// LIKE patterns are always text.
    fn filter_value(&self, filter: &Filter) -> SqlValue {
        let pattern = matches!(filter.op, Operator::Like | Operator::Nlike);
        if self.config.typed_filter_values && !pattern {
            SqlValue::infer(&filter.value)
        } else {
            SqlValue::String(filter.value.clone())
        }
    }
}

/// Collects parameters while a statement is being written.
struct Binder {
    style: PlaceholderStyle,
    params: Vec<Param>,
    names: HashSet<String>,
}

impl Binder {
    /// Record `value` and return the placeholder text for it.
    fn bind(&mut self, hint: &str, value: SqlValue) -> String {
        let index = self.params.len() + 1;
        let name = if self.style.is_named() {
            Some(self.unique_name(hint, index))
        } else {
            None
        };
        let placeholder = self.style.render(index, name.as_deref().unwrap_or_default());
        self.params.push(Param { name, value });
        placeholder
    }

    /// Names must stay distinct after sanitising: `a-b` and `a b` both
    /// reduce to `a_b`.
    fn unique_name(&mut self, hint: &str, index: usize) -> String {
        let base = param_name(hint, index);
        let mut name = base.clone();
        let mut suffix = index;
        while self.names.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.names.insert(name.clone());
        name
    }

    fn finish(self, text: String) -> CompiledStatement {
        CompiledStatement {
            text,
            params: self.params,
        }
    }
}

/// Derive a bind-safe parameter name: `[A-Za-z0-9_]` only.
fn param_name(hint: &str, index: usize) -> String {
    let name: String = hint
        .trim_start_matches(['@', ':'])
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        format!("p{}", index)
    } else {
        name
    }
}
