//! Dialect conventions: identifier quoting, placeholders, pagination.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TableGateError;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    #[default]
    SqlServer,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn generator(&self) -> Box<dyn SqlGenerator + Send + Sync> {
        match self {
            Dialect::SqlServer => Box::new(SqlServerGenerator),
            Dialect::Postgres => Box::new(PostgresGenerator),
            Dialect::Sqlite => Box::new(SqliteGenerator),
        }
    }

    /// Guess the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':')?.0;
        match scheme {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "sqlite" => Some(Dialect::Sqlite),
            "mssql" | "sqlserver" => Some(Dialect::SqlServer),
            _ => None,
        }
    }
}

impl FromStr for Dialect {
    type Err = TableGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql-server" | "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(TableGateError::Config(format!("unknown dialect '{}'", other))),
        }
    }
}

/// How parameter slots are written into statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaceholderStyle {
    /// `?`
    Positional,
    /// `$1`, `$2`, ...
    Dollar,
    /// `@p1`, `@p2`, ...
    AtIndexed,
    /// `@name`
    NamedAt,
    /// `:name`
    NamedColon,
}

impl PlaceholderStyle {
    /// Render slot `index` (1-based); `name` is used by the named styles only.
    pub fn render(self, index: usize, name: &str) -> String {
        match self {
            PlaceholderStyle::Positional => "?".to_string(),
            PlaceholderStyle::Dollar => format!("${}", index),
            PlaceholderStyle::AtIndexed => format!("@p{}", index),
            PlaceholderStyle::NamedAt => format!("@{}", name),
            PlaceholderStyle::NamedColon => format!(":{}", name),
        }
    }

    pub fn is_named(self) -> bool {
        matches!(self, PlaceholderStyle::NamedAt | PlaceholderStyle::NamedColon)
    }
}

impl FromStr for PlaceholderStyle {
    type Err = TableGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positional" | "?" => Ok(PlaceholderStyle::Positional),
            "dollar" | "$" => Ok(PlaceholderStyle::Dollar),
            "at-indexed" => Ok(PlaceholderStyle::AtIndexed),
            "named-at" | "@" => Ok(PlaceholderStyle::NamedAt),
            "named-colon" | ":" => Ok(PlaceholderStyle::NamedColon),
            other => Err(TableGateError::Config(format!(
                "unknown placeholder style '{}'",
                other
            ))),
        }
    }
}

/// Where the row window goes in a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationStyle {
    /// Trailing `LIMIT n OFFSET m`.
    LimitOffset,
    /// Trailing `OFFSET m ROWS FETCH NEXT n ROWS ONLY`.
    OffsetFetch,
    /// Leading `SELECT TOP (n)`; cannot express an offset.
    Top,
}

impl FromStr for PaginationStyle {
    type Err = TableGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "limit-offset" => Ok(PaginationStyle::LimitOffset),
            "offset-fetch" => Ok(PaginationStyle::OffsetFetch),
            "top" => Ok(PaginationStyle::Top),
            other => Err(TableGateError::Config(format!(
                "unknown pagination style '{}'",
                other
            ))),
        }
    }
}

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator {
    /// Quote an identifier (schema, table, column or routine name).
    fn quote_identifier(&self, name: &str) -> String;
    /// Native placeholder style.
    fn placeholders(&self) -> PlaceholderStyle;
    /// Native pagination style.
    fn pagination(&self) -> PaginationStyle;
    /// Schema assumed when a request names none.
    fn default_schema(&self) -> &'static str;
    /// Whether filter values must be bound as typed literals. Servers that
    /// refuse implicit text-to-number comparison need this.
    fn typed_filter_values(&self) -> bool {
        false
    }
}

/// Wrap `name` in `open`/`close`, doubling every `close` inside it.
///
/// Total: any string, including an empty one, yields a single identifier token.
pub fn quote_with(name: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(open);
    for c in name.chars() {
        if c == close {
            out.push(close);
        }
        out.push(c);
    }
    out.push(close);
    out
}

pub struct SqlServerGenerator;

impl SqlGenerator for SqlServerGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '[', ']')
    }

    fn placeholders(&self) -> PlaceholderStyle {
        PlaceholderStyle::AtIndexed
    }

    fn pagination(&self) -> PaginationStyle {
        PaginationStyle::OffsetFetch
    }

    fn default_schema(&self) -> &'static str {
        "dbo"
    }
}

pub struct PostgresGenerator;

impl SqlGenerator for PostgresGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"', '"')
    }

    fn placeholders(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }

    fn pagination(&self) -> PaginationStyle {
        PaginationStyle::LimitOffset
    }

    fn default_schema(&self) -> &'static str {
        "public"
    }

    fn typed_filter_values(&self) -> bool {
        true
    }
}

pub struct SqliteGenerator;

impl SqlGenerator for SqliteGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"', '"')
    }

    fn placeholders(&self) -> PlaceholderStyle {
        PlaceholderStyle::Positional
    }

    fn pagination(&self) -> PaginationStyle {
        PaginationStyle::LimitOffset
    }

    fn default_schema(&self) -> &'static str {
        "main"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reads one delimited identifier back, undoing the doubling.
    fn unquote(token: &str, open: char, close: char) -> Option<String> {
        let inner = token.strip_prefix(open)?.strip_suffix(close)?;
        let mut out = String::new();
        let mut chars = inner.chars().peekable();
        while let Some(c) = chars.next() {
            if c == close {
                // a lone closing delimiter would have ended the token
                if chars.next() != Some(close) {
                    return None;
                }
            }
            out.push(c);
        }
        Some(out)
    }

    #[test]
    fn test_bracket_quoting() {
        let g = SqlServerGenerator;
        assert_eq!(g.quote_identifier("projects"), "[projects]");
        assert_eq!(g.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(g.quote_identifier(""), "[]");
    }

    #[test]
    fn test_ansi_quoting() {
        let g = PostgresGenerator;
        assert_eq!(g.quote_identifier("order"), "\"order\"");
        assert_eq!(g.quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_quoting_reparses_to_the_same_name() {
        let names = [
            "id",
            "",
            "]",
            "]]",
            "x]; DROP TABLE users; --",
            "weird \"name\"",
            "[already]",
            "ünïcödé",
        ];
        for name in names {
            let bracketed = quote_with(name, '[', ']');
            assert_eq!(unquote(&bracketed, '[', ']').as_deref(), Some(name));
            let ansi = quote_with(name, '"', '"');
            assert_eq!(unquote(&ansi, '"', '"').as_deref(), Some(name));
        }
    }

    #[test]
    fn test_placeholder_rendering() {
        assert_eq!(PlaceholderStyle::Positional.render(3, "x"), "?");
        assert_eq!(PlaceholderStyle::Dollar.render(3, "x"), "$3");
        assert_eq!(PlaceholderStyle::AtIndexed.render(3, "x"), "@p3");
        assert_eq!(PlaceholderStyle::NamedAt.render(3, "f0_id"), "@f0_id");
        assert_eq!(PlaceholderStyle::NamedColon.render(3, "f0_id"), ":f0_id");
    }

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(Dialect::from_url("postgres://localhost/db"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_url("sqlite::memory:"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_url("nonsense"), None);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("sql-server".parse::<Dialect>().unwrap(), Dialect::SqlServer);
        assert_eq!("PG".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
