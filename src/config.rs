//! Configuration.
//!
//! [`CompilerConfig`] is the single place that fixes the SQL convention
//! (quoting, placeholders, pagination, default schema). [`AppConfig`] wraps it
//! with the server settings and is loaded from TOML plus environment
//! overrides:
//!
//! ```toml
//! database_url = "postgres://localhost/app"
//! bind_address = "0.0.0.0:3000"
//! record_limit = 1000
//!
//! [compiler]
//! dialect = "postgres"
//! pagination = "limit-offset"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ast::DEFAULT_SCHEMA;
use crate::error::{GateResult, TableGateError};
use crate::transpiler::dialect::{Dialect, PaginationStyle, PlaceholderStyle};

/// SQL convention used by a [`Compiler`](crate::transpiler::Compiler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CompilerSection")]
pub struct CompilerConfig {
    pub dialect: Dialect,
    pub default_schema: String,
    pub placeholders: PlaceholderStyle,
    pub pagination: PaginationStyle,
    /// Bind filter values as numbers or booleans when they read as one.
    pub typed_filter_values: bool,
}

/// Bracket quoting, `dbo`, positional `?` and trailing LIMIT/OFFSET.
impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::SqlServer,
            default_schema: DEFAULT_SCHEMA.to_string(),
            placeholders: PlaceholderStyle::Positional,
            pagination: PaginationStyle::LimitOffset,
            typed_filter_values: false,
        }
    }
}

impl CompilerConfig {
    /// The dialect's native conventions.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let generator = dialect.generator();
        Self {
            dialect,
            default_schema: generator.default_schema().to_string(),
            placeholders: generator.placeholders(),
            pagination: generator.pagination(),
            typed_filter_values: generator.typed_filter_values(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    pub fn placeholders(mut self, style: PlaceholderStyle) -> Self {
        self.placeholders = style;
        self
    }

    pub fn pagination(mut self, style: PaginationStyle) -> Self {
        self.pagination = style;
        self
    }

    pub fn typed_filter_values(mut self, typed: bool) -> Self {
        self.typed_filter_values = typed;
        self
    }
}

/// On-disk form: unset keys fall back to the chosen dialect's conventions.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompilerSection {
    dialect: Option<Dialect>,
    default_schema: Option<String>,
    placeholders: Option<PlaceholderStyle>,
    pagination: Option<PaginationStyle>,
    typed_filter_values: Option<bool>,
}

impl From<CompilerSection> for CompilerConfig {
    fn from(section: CompilerSection) -> Self {
        let mut config = match section.dialect {
            Some(dialect) => CompilerConfig::for_dialect(dialect),
            None => CompilerConfig::default(),
        };
        if let Some(schema) = section.default_schema {
            config.default_schema = schema;
        }
        if let Some(style) = section.placeholders {
            config.placeholders = style;
        }
        if let Some(style) = section.pagination {
            config.pagination = style;
        }
        if let Some(typed) = section.typed_filter_values {
            config.typed_filter_values = typed;
        }
        config
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database connection URL
    #[serde(default)]
    pub database_url: Option<String>,

    /// Server bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Row cap applied to reads that do not ask for a limit; 0 disables it.
    #[serde(default = "default_record_limit")]
    pub record_limit: u64,

    /// Permit UPDATE/DELETE requests that carry no filters.
    #[serde(default)]
    pub allow_unfiltered_writes: bool,

    /// Overrides the compiler's default schema.
    #[serde(default)]
    pub default_schema: Option<String>,

    #[serde(default)]
    pub compiler: Option<CompilerConfig>,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_record_limit() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_address: default_bind_address(),
            max_connections: default_max_connections(),
            cors_enabled: true,
            record_limit: default_record_limit(),
            allow_unfiltered_writes: false,
            default_schema: None,
            compiler: None,
        }
    }
}

impl AppConfig {
    /// Create a new configuration builder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Default config file: `<config dir>/tablegate/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tablegate").join("config.toml"))
    }

    /// Load from `path` (must exist) or the default location (optional),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> GateResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> GateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| TableGateError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> GateResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| TableGateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Every table is schema-qualified, so a blank schema can never compile.
    fn validate(&self) -> GateResult<()> {
        let schemas = [
            self.default_schema.as_deref(),
            self.compiler.as_ref().map(|c| c.default_schema.as_str()),
        ];
        if schemas.into_iter().flatten().any(|s| s.trim().is_empty()) {
            return Err(TableGateError::Config("default_schema is empty".into()));
        }
        Ok(())
    }

    /// Apply `DATABASE_URL`, `BIND_ADDRESS`, `PORT`, `RECORD_LIMIT`,
    /// `DB_SCHEMA` and `DB_MAX_CONNECTIONS`. `PORT` wins over `BIND_ADDRESS`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> GateResult<()> {
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(addr) = var("BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(port) = var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| TableGateError::Config(format!("PORT is not a port number: '{}'", port)))?;
            self.bind_address = format!("0.0.0.0:{}", port);
        }
        if let Some(limit) = var("RECORD_LIMIT") {
            self.record_limit = limit.parse().map_err(|_| {
                TableGateError::Config(format!("RECORD_LIMIT is not a number: '{}'", limit))
            })?;
        }
        if let Some(schema) = var("DB_SCHEMA") {
            if schema.trim().is_empty() {
                return Err(TableGateError::Config("DB_SCHEMA is empty".into()));
            }
            self.default_schema = Some(schema);
        }
        if let Some(n) = var("DB_MAX_CONNECTIONS") {
            self.max_connections = n.parse().map_err(|_| {
                TableGateError::Config(format!("DB_MAX_CONNECTIONS is not a number: '{}'", n))
            })?;
        }
        Ok(())
    }

    /// Effective compiler settings.
    ///
    /// Without an explicit `[compiler]` section the dialect follows the
    /// database URL scheme.
    pub fn compiler_config(&self) -> CompilerConfig {
        let mut config = match &self.compiler {
            Some(config) => config.clone(),
            None => self
                .database_url
                .as_deref()
                .and_then(Dialect::from_url)
                .map(CompilerConfig::for_dialect)
                .unwrap_or_default(),
        };
        if let Some(schema) = &self.default_schema {
            config.default_schema = schema.clone();
        }
        config
    }

    /// `None` when the row cap is disabled.
    pub fn default_limit(&self) -> Option<u64> {
        (self.record_limit > 0).then_some(self.record_limit)
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the database URL
    pub fn database(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Set the bind address
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_address = addr.into();
        self
    }

    pub fn record_limit(mut self, limit: u64) -> Self {
        self.config.record_limit = limit;
        self
    }

    pub fn allow_unfiltered_writes(mut self, allow: bool) -> Self {
        self.config.allow_unfiltered_writes = allow;
        self
    }

    pub fn compiler(mut self, compiler: CompilerConfig) -> Self {
        self.config.compiler = Some(compiler);
        self
    }

    /// Build the configuration
    pub fn build(self) -> AppConfig {
        self.config
    }
}
