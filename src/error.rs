//! Error types for tablegate.

use thiserror::Error;

/// The main error type for tablegate operations.
#[derive(Debug, Error)]
pub enum TableGateError {
    /// A filter string does not match `column=operator.value`.
    #[error("Invalid filter format: '{raw}'")]
    FilterSyntax { raw: String },

    /// Operator token outside the supported set.
    #[error("Unknown operator: '{0}'. Expected one of: eq, neq, gt, lt, gte, lte, like, nlike, in, nin")]
    UnknownOperator(String),

    /// Structurally impossible request (e.g. UPDATE without columns).
    #[error("Invalid statement: {0}")]
    InvalidShape(String),

    /// A query-string parameter could not be interpreted.
    #[error("Invalid value for '{name}': '{value}'")]
    InvalidParameter { name: String, value: String },

    /// Request body is not of the expected shape.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TableGateError {
    /// Create a filter syntax error for the offending raw string.
    pub fn filter_syntax(raw: impl Into<String>) -> Self {
        Self::FilterSyntax { raw: raw.into() }
    }

    /// Create an invalid statement shape error.
    pub fn shape(message: impl Into<String>) -> Self {
        Self::InvalidShape(message.into())
    }

    /// Create an invalid query parameter error.
    pub fn parameter(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            value: value.into(),
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::FilterSyntax { .. } => 400,
            Self::UnknownOperator(_) => 400,
            Self::InvalidShape(_) => 400,
            Self::InvalidParameter { .. } => 400,
            Self::InvalidBody(_) => 400,
            Self::Connection(_) => 503,
            Self::Execution(_) => 500,
            Self::Config(_) => 500,
            Self::Io(_) => 500,
        }
    }

    /// Stable machine-readable code for error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FilterSyntax { .. } => "FILTER_SYNTAX",
            Self::UnknownOperator(_) => "UNKNOWN_OPERATOR",
            Self::InvalidShape(_) => "INVALID_STATEMENT",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Execution(_) => "EXECUTION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Result type alias for tablegate operations.
pub type GateResult<T> = Result<T, TableGateError>;
