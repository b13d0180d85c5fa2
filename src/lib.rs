//! # tablegate: REST-to-SQL bridge
//!
//! tablegate turns an HTTP request against `/<table>` into one parameterized
//! SQL statement, without per-table code.
//!
//! ## Quick Example
//!
//! ```
//! use tablegate::prelude::*;
//!
//! let compiler = Compiler::default();
//! let req = SelectRequest {
//!     select: vec!["id".into(), "name".into()],
//!     order: vec![OrderSpec::new("name")],
//!     page: Pagination::new(Some(10), Some(0)),
//!     ..SelectRequest::all(compiler.table("projects").unwrap())
//! };
//! let stmt = compiler.compile_select(&req).unwrap();
//! assert_eq!(
//!     stmt.text,
//!     "SELECT [id], [name] FROM [dbo].[projects] ORDER BY [name] LIMIT 10"
//! );
//! ```
//!
//! ## Filter Operators
//!
//! | Token   | SQL        |
//! |---------|------------|
//! | `eq`    | `=`        |
//! | `neq`   | `<>`       |
//! | `gt`    | `>`        |
//! | `lt`    | `<`        |
//! | `gte`   | `>=`       |
//! | `lte`   | `<=`       |
//! | `like`  | `LIKE`     |
//! | `nlike` | `NOT LIKE` |
//! | `in`    | `IN`       |
//! | `nin`   | `NOT IN`   |

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod server;
pub mod translate;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::CompilerConfig;
    pub use crate::engine::{JsonRow, SqlxExecutor, StatementExecutor};
    pub use crate::error::*;
    pub use crate::parser::{parse_filter, parse_filter_object, parse_filters};
    pub use crate::transpiler::{
        Compiler, Dialect, PaginationStyle, PlaceholderStyle, SqlGenerator, resolve,
    };
}

/// Quote an identifier with the default bracket convention.
///
/// # Example
///
/// ```
/// assert_eq!(tablegate::quote("a]b"), "[a]]b]");
/// ```
pub fn quote(name: &str) -> String {
    transpiler::dialect::quote_with(name, '[', ']')
}
