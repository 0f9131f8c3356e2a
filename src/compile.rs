//! End-to-end compilation from a query request to SQL.
//!
//! This module provides the high-level API of the crate:
//!
//! ```text
//! Query → Expand (members, filters, segments) → Assemble (statements) → SQL + bindings
//! ```
//!
//! # Example
//!
//! ```ignore
//! use semlayer::compile::{compile, CompileOptions};
//! use semlayer::semantic::Query;
//! use semlayer::sql::Dialect;
//!
//! let query = Query::new()
//!     .dimension("user.first_name")
//!     .metric("user.count");
//!
//! let options = CompileOptions::default().with_dialect(Dialect::Postgres);
//! let compiled = compile(&repository, &query, &options)?;
//! println!("{}", compiled.sql);
//! ```

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::semantic::planner::{build_statement, CompileSession};
use crate::semantic::{Query, Repository, SemanticError};
use crate::sql::{Dialect, Layout, SqlDialect};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error("Invalid request: {0}")]
    Request(#[from] serde_json::Error),

    /// Rendered SQL and the binding list disagree; indicates a template that
    /// embeds a raw `?` in literal SQL.
    #[error("SQL has {markers} placeholders but {bindings} bindings")]
    BindingMismatch { markers: usize, bindings: usize },
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,

    /// "Now" for relative date filters.
    pub reference_time: NaiveDateTime,

    /// Opaque value handed to member and join definitions.
    pub context: Value,

    /// Multi-line output.
    pub pretty: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            reference_time: chrono::Local::now().naive_local(),
            context: Value::Null,
            pretty: false,
        }
    }
}

impl CompileOptions {
    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Pin the reference time used by relative date filters.
    pub fn with_reference_time(mut self, reference_time: NaiveDateTime) -> Self {
        self.reference_time = reference_time;
        self
    }

    /// Set the compile context.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// SQL text in the dialect's placeholder syntax, plus its bindings in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Compile a query against a repository.
///
/// Each call owns its member cache; a repository can be shared by any number
/// of concurrent compiles.
pub fn compile(
    repository: &Repository,
    query: &Query,
    options: &CompileOptions,
) -> CompileResult<CompiledQuery> {
    let session = CompileSession::new(
        repository,
        options.dialect,
        &options.context,
        options.reference_time,
    );
    let statement = build_statement(&session, query)?;

    let layout = if options.pretty {
        Layout::pretty()
    } else {
        Layout::compact()
    };
    let fragment = statement.render_with_layout(options.dialect, layout);

    let markers = fragment.marker_count();
    if markers != fragment.bindings.len() {
        return Err(CompileError::BindingMismatch {
            markers,
            bindings: fragment.bindings.len(),
        });
    }

    debug!(
        dialect = %options.dialect,
        members = session.cached_members(),
        bindings = fragment.bindings.len(),
        "compiled query"
    );

    Ok(CompiledQuery {
        sql: options.dialect.translate_placeholders(&fragment.sql),
        bindings: fragment.bindings,
    })
}

/// Compile a JSON-encoded query request.
pub fn compile_json(
    repository: &Repository,
    request: &str,
    options: &CompileOptions,
) -> CompileResult<CompiledQuery> {
    let query = Query::from_json(request)?;
    compile(repository, &query, options)
}

// ============================================================================
// Tests
// ============================================================================
