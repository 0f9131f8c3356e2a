//! semlayer CLI - Compile semantic queries to SQL
//!
//! Usage:
//!   semlayer compile --schema <schema.toml> --query <json|file> [--dialect <dialect>]
//!   semlayer members --schema <schema.toml>
//!   semlayer validate --schema <schema.toml>
//!
//! Defaults for `--schema`, `--dialect` and `--pretty` come from the settings
//! file (`SEMLAYER_CONFIG`, `./semlayer.toml`, or the user config dir).
//!
//! Examples:
//!   semlayer compile --schema schema.toml --query '{"dimensions":["user.first_name"],"metrics":["user.count"]}'
//!   semlayer compile --schema schema.toml --query request.json --dialect postgres --output json
//!   semlayer members --schema schema.toml

use clap::{Parser, Subcommand, ValueEnum};
use semlayer::compile::{compile_json, CompileOptions};
use semlayer::config::Settings;
use semlayer::model::loader::load_schema;
use semlayer::semantic::Repository;
use semlayer::sql::Dialect;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "semlayer")]
#[command(about = "semlayer - A semantic layer that compiles analytic queries to multi-dialect SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query request to SQL
    Compile {
        /// Path to the schema TOML
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Query request: inline JSON or a path to a JSON file
        #[arg(short, long)]
        query: String,

        /// SQL dialect to generate
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Compile context as inline JSON
        #[arg(short, long)]
        context: Option<String>,

        /// Multi-line SQL
        #[arg(long)]
        pretty: bool,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// List addressable member paths
    Members {
        /// Path to the schema TOML
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Validate a schema without compiling anything
    Validate {
        /// Path to the schema TOML
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Ansi,
    Postgres,
    Duckdb,
    Databricks,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Ansi => Dialect::Ansi,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Databricks => Dialect::Databricks,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// SQL, then bindings as a comment
    Sql,
    /// `{"sql": ..., "bindings": [...]}`
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile {
            schema,
            query,
            dialect,
            context,
            pretty,
            output,
        } => {
            let Some(repository) = load_repository(schema, &settings) else {
                return ExitCode::FAILURE;
            };
            let mut options = CompileOptions::default()
                .with_dialect(dialect.map(Dialect::from).unwrap_or(settings.compiler.dialect))
                .with_pretty(pretty || settings.compiler.pretty);
            if let Some(context) = context {
                match serde_json::from_str(&context) {
                    Ok(value) => options = options.with_context(value),
                    Err(e) => {
                        eprintln!("Invalid --context JSON: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            cmd_compile(&repository, &query, &options, output)
        }
        Commands::Members { schema } => match load_repository(schema, &settings) {
            Some(repository) => cmd_members(&repository),
            None => ExitCode::FAILURE,
        },
        Commands::Validate { schema } => match load_repository(schema, &settings) {
            Some(repository) => {
                println!(
                    "✓ Schema is valid ({} models, {} joins)",
                    repository.models().len(),
                    repository.joins().len()
                );
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
    }
}

/// Load the schema named on the command line, else the one in settings.
fn load_repository(schema: Option<PathBuf>, settings: &Settings) -> Option<Repository> {
    let path = match schema {
        Some(path) => path,
        None => match settings.schema.resolved_path() {
            Ok(Some(path)) => path,
            Ok(None) => {
                eprintln!("No schema given: pass --schema or set [schema] path in semlayer.toml");
                return None;
            }
            Err(e) => {
                eprintln!("Error resolving schema path: {}", e);
                return None;
            }
        },
    };

    match load_schema(&path) {
        Ok(repository) => Some(repository),
        Err(e) => {
            eprintln!("Error loading schema '{}': {}", path.display(), e);
            None
        }
    }
}

fn cmd_compile(
    repository: &Repository,
    query: &str,
    options: &CompileOptions,
    output: OutputFormat,
) -> ExitCode {
    let request = if query.trim_start().starts_with('{') {
        query.to_string()
    } else {
        match fs::read_to_string(query) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading query file '{}': {}", query, e);
                return ExitCode::FAILURE;
            }
        }
    };

    let compiled = match compile_json(repository, &request, options) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match output {
        OutputFormat::Sql => {
            println!("{}", compiled.sql);
            if !compiled.bindings.is_empty() {
                println!(
                    "-- bindings: {}",
                    serde_json::Value::Array(compiled.bindings)
                );
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&compiled) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

fn cmd_members(repository: &Repository) -> ExitCode {
    for path in repository.member_paths() {
        println!("{}", path);
    }
    ExitCode::SUCCESS
}
