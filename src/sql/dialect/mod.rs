//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (ANSI/PG/DuckDB), `` ` `` (Databricks), `*` passed through
//! - Temporal granularity: `date_trunc`/`extract` vs `date_part` vs Spark functions
//! - Pattern matching: `<expr> [not] ilike ['%' ||] ? [|| '%']`
//! - Binding placeholders: `?` passthrough vs numbered `$1, $2, ...`
//! - Pagination: `limit ?` / `offset ?`, either clause omitted when absent
//!
//! # Usage
//!
//! ```ignore
//! use semlayer::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! let sql = dialect.translate_placeholders("a = ? and b = ?"); // a = $1 and b = $2
//! ```
//!
//! | Feature | ANSI | PostgreSQL | DuckDB | Databricks |
//! |---------|------|------------|--------|------------|
//! | Quoting | `"x"` | `"x"` | `"x"` | `` `x` `` |
//! | Placeholders | `?` | `$n` | `$n` | `?` |
//! | Extraction | `extract` | `extract` | `date_part` | `month()`, `hour()`, ... |

mod ansi;
mod databricks;
mod duckdb;
pub mod helpers;
mod postgres;

pub use ansi::Ansi;
pub use databricks::Databricks;
pub use duckdb::DuckDb;
pub use postgres::Postgres;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fragment::SqlFragment;
use super::token::TokenStream;
use crate::model::Granularity;

/// How a dialect spells bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` markers are passed through unchanged.
    Positional,
    /// `?` markers become `$1`, `$2`, ... in order.
    Numbered,
}

/// Shape of a pattern match: wildcards on either side, optional negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternMatch {
    pub leading_wildcard: bool,
    pub trailing_wildcard: bool,
    pub negated: bool,
}

impl PatternMatch {
    pub fn contains() -> Self {
        Self {
            leading_wildcard: true,
            trailing_wildcard: true,
            negated: false,
        }
    }

    pub fn starts_with() -> Self {
        Self {
            leading_wildcard: false,
            trailing_wildcard: true,
            negated: false,
        }
    }

    pub fn ends_with() -> Self {
        Self {
            leading_wildcard: true,
            trailing_wildcard: false,
            negated: false,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - ANSI/PostgreSQL/DuckDB: `"identifier"`
    /// - Databricks: `` `identifier` ``
    ///
    /// The wildcard `*` is never quoted.
    fn quote_identifier(&self, ident: &str) -> String;

    // =========================================================================
    // Temporal Granularity
    // =========================================================================

    /// Wrap `expr` with the truncation/extraction expression for `granularity`.
    fn granularity(&self, granularity: Granularity, expr: &SqlFragment) -> SqlFragment;

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Case-insensitive pattern-match operator.
    fn pattern_operator(&self) -> &'static str {
        "ilike"
    }

    /// Render `<expr> [not] <op> ['%' ||] ? [|| '%']` with `value` bound.
    fn pattern_match(&self, expr: &SqlFragment, pattern: PatternMatch, value: Value) -> SqlFragment {
        let concat = self.concat_operator();
        let mut out = expr.clone();
        out.push_sql(" ");
        if pattern.negated {
            out.push_sql("not ");
        }
        out.push_sql(self.pattern_operator()).push_sql(" ");
        if pattern.leading_wildcard {
            out.push_sql(&format!("'%' {} ", concat));
        }
        out.append(&SqlFragment::binding(value));
        if pattern.trailing_wildcard {
            out.push_sql(&format!(" {} '%'", concat));
        }
        out
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    /// Native parameter syntax of this dialect.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Translate neutral `?` markers into the native parameter syntax.
    fn translate_placeholders(&self, sql: &str) -> String {
        helpers::translate_placeholders(sql, self.placeholder_style())
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit `limit ?` / `offset ?`, each only when present.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Ansi,
    Postgres,
    DuckDb,
    Databricks,
}

impl Dialect {
    /// Every dialect, in declaration order.
    pub const ALL: [Dialect; 4] = [
        Dialect::Ansi,
        Dialect::Postgres,
        Dialect::DuckDb,
        Dialect::Databricks,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Ansi => &Ansi,
            Dialect::Postgres => &Postgres,
            Dialect::DuckDb => &DuckDb,
            Dialect::Databricks => &Databricks,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn granularity(&self, granularity: Granularity, expr: &SqlFragment) -> SqlFragment {
        self.dialect().granularity(granularity, expr)
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn pattern_operator(&self) -> &'static str {
        self.dialect().pattern_operator()
    }

    fn pattern_match(&self, expr: &SqlFragment, pattern: PatternMatch, value: Value) -> SqlFragment {
        self.dialect().pattern_match(expr, pattern, value)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.dialect().placeholder_style()
    }

    fn translate_placeholders(&self, sql: &str) -> String {
        self.dialect().translate_placeholders(sql)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

/// Unknown dialect name.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unknown dialect '{0}' (expected one of: ansi, postgres, duckdb, databricks)")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .iter()
            .copied()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownDialect(s.to_string()))
    }
}
