//! tablegate: REST-to-SQL bridge CLI
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP bridge
//! tablegate serve --database-url postgres://localhost/app
//!
//! # Dry run (show SQL and bindings only)
//! tablegate sql get projects --select id,name --order name --limit 10
//! tablegate sql delete projects --filter id=eq.5
//!
//! # Operator reference
//! tablegate operators
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use tracing_subscriber::EnvFilter;

use tablegate::config::{AppConfig, CompilerConfig};
use tablegate::prelude::*;
use tablegate::server;
use tablegate::translate::{QueryParams, RoutineBody, TranslateOptions, Translator};

#[derive(Parser)]
#[command(name = "tablegate")]
#[command(version)]
#[command(about = "Generic REST-to-SQL bridge", long_about = None)]
#[command(after_help = "EXAMPLES:
    tablegate serve --database-url sqlite://app.db
    tablegate sql get projects --filter 'name=eq.project1' --order name.desc
    tablegate sql post projects --body '{\"id\": 1, \"name\": \"project1\"}'
    tablegate sql rpc getTotals --body '{\"function\": true, \"returns\": \"TABLE\", \"args\": [{\"name\": \"year\", \"value\": 2024}]}'")]
struct Cli {
    /// Config file (default: <config dir>/tablegate/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Database connection URL
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,

        /// Bind address, e.g. 127.0.0.1:8080
        #[arg(short, long)]
        bind: Option<String>,

        /// Permit UPDATE/DELETE requests without filters
        #[arg(long)]
        allow_unfiltered_writes: bool,
    },
    /// Show the SQL a request would produce, without executing it
    Sql(SqlArgs),
    /// Show the filter operator reference
    Operators,
}

#[derive(clap::Args)]
struct SqlArgs {
    /// Request kind
    #[arg(value_enum)]
    method: Method,

    /// Table name (routine name for `rpc`)
    target: String,

    /// Filter `column=operator.value` or `{"column": {"op": .., "value": ..}}` (repeatable)
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    /// Comma-separated columns
    #[arg(short, long)]
    select: Option<String>,

    /// Comma-separated `column[.asc|.desc]`
    #[arg(short, long)]
    order: Option<String>,

    #[arg(short, long)]
    limit: Option<String>,

    #[arg(long)]
    offset: Option<String>,

    /// JSON request body
    #[arg(short, long)]
    body: Option<String>,

    /// Override the dialect (sql-server, postgres, sqlite)
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Override the placeholder style (positional, dollar, at-indexed, named-at, named-colon)
    #[arg(long)]
    placeholders: Option<PlaceholderStyle>,

    /// Override the pagination style (limit-offset, offset-fetch, top)
    #[arg(long)]
    pagination: Option<PaginationStyle>,

    /// Override the default schema
    #[arg(long)]
    schema: Option<String>,

    /// Print the compiled statement as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
    Rpc,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            database_url,
            bind,
            allow_unfiltered_writes,
        } => {
            run_server(
                cli.config,
                database_url,
                bind,
                allow_unfiltered_writes,
            )
            .await
        }
        Commands::Sql(args) => dry_run(cli.config, args),
        Commands::Operators => {
            show_operators();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so `tablegate sql` output stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tablegate=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_server(
    config_path: Option<PathBuf>,
    database_url: Option<String>,
    bind: Option<String>,
    allow_unfiltered_writes: bool,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;
    if let Some(url) = database_url {
        config.database_url = Some(url);
    }
    if let Some(addr) = bind {
        config.bind_address = addr;
    }
    if allow_unfiltered_writes {
        config.allow_unfiltered_writes = true;
    }

    println!("{}", "tablegate".cyan().bold());
    server::serve(config).await?;
    Ok(())
}

fn dry_run(config_path: Option<PathBuf>, args: SqlArgs) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;

    let mut compiler_config = match args.dialect {
        Some(dialect) => CompilerConfig::for_dialect(dialect),
        None => config.compiler_config(),
    };
    if let Some(style) = args.placeholders {
        compiler_config.placeholders = style;
    }
    if let Some(style) = args.pagination {
        compiler_config.pagination = style;
    }
    if let Some(schema) = args.schema {
        compiler_config.default_schema = schema;
    }

    let translator = Translator::new(
        Compiler::new(compiler_config),
        TranslateOptions::from(&config),
    );

    let query = QueryParams {
        select: args.select,
        order: args.order,
        filters: args.filters,
        limit: args.limit,
        offset: args.offset,
    };
    let body: serde_json::Value = match args.body.as_deref() {
        Some(text) => serde_json::from_str(text).context("parsing --body")?,
        None => serde_json::Value::Null,
    };

    let target = args.target.as_str();
    let request = match args.method {
        Method::Get => translator.read(target, &query)?,
        Method::Post => translator.insert(target, body)?,
        Method::Patch | Method::Put => translator.update(target, &query, body)?,
        Method::Delete => translator.delete(target, &query)?,
        Method::Rpc => {
            let body: RoutineBody = if body.is_null() {
                RoutineBody::default()
            } else {
                serde_json::from_value(body).context("parsing --body")?
            };
            translator.call(target, body)?
        }
    };
    let stmt = translator.compile(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stmt)?);
        return Ok(());
    }

    println!("{}", "Generated SQL:".green().bold());
    println!("{}", stmt.text.white());

    if !stmt.params.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, param) in stmt.params.iter().enumerate() {
            let label = match &param.name {
                Some(name) => name.clone(),
                None => format!("#{}", i + 1),
            };
            println!("  {} = {}", label, param.value.to_string().yellow());
        }
    }

    Ok(())
}

fn show_operators() {
    println!("{}", "tablegate Filter Operators".cyan().bold());
    println!();
    println!(
        "{:8} {:10} {}",
        "Token".white().bold(),
        "SQL".white().bold(),
        "Example".white().bold()
    );
    println!("{}", "─".repeat(50).dimmed());

    for op in Operator::ALL {
        let example = match op {
            Operator::Like | Operator::Nlike => format!("name={}.proj%", op),
            Operator::In | Operator::Nin => format!("id={}.7", op),
            _ => format!("age={}.18", op),
        };
        println!(
            "{:8} {:10} {}",
            op.token().cyan().bold(),
            op.sql().yellow(),
            example.dimmed()
        );
    }
}
