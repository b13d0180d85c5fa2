//! Operator token → SQL operator text.

use std::str::FromStr;

use crate::ast::Operator;
use crate::error::{GateResult, TableGateError};

impl Operator {
    /// Look up a wire token. Matching is exact: `EQ` is not `eq`.
    pub fn from_token(token: &str) -> GateResult<Self> {
        match token {
            "eq" => Ok(Operator::Eq),
            "neq" => Ok(Operator::Neq),
            "gt" => Ok(Operator::Gt),
            "lt" => Ok(Operator::Lt),
            "gte" => Ok(Operator::Gte),
            "lte" => Ok(Operator::Lte),
            "like" => Ok(Operator::Like),
            "nlike" => Ok(Operator::Nlike),
            "in" => Ok(Operator::In),
            "nin" => Ok(Operator::Nin),
            other => Err(TableGateError::UnknownOperator(other.to_string())),
        }
    }

    /// Look up SQL operator text, e.g. `>=` or `not like`. `!=` is accepted
    /// for `<>`.
    pub fn from_sql(sql: &str) -> GateResult<Self> {
        let normalized = sql.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized == "!=" {
            return Ok(Operator::Neq);
        }
        Operator::ALL
            .into_iter()
            .find(|op| op.sql().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| TableGateError::UnknownOperator(sql.to_string()))
    }

    /// SQL text for this operator.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::Nlike => "NOT LIKE",
            Operator::In => "IN",
            Operator::Nin => "NOT IN",
        }
    }

    /// `IN`/`NOT IN` take a parenthesized operand.
    pub fn is_membership(self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }
}

impl FromStr for Operator {
    type Err = TableGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::from_token(s)
    }
}

/// Resolve a wire token straight to its SQL operator text.
pub fn resolve(token: &str) -> GateResult<&'static str> {
    Operator::from_token(token).map(Operator::sql)
}
