//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Numbered parameters (`$1`, `$2`, ...)
//! - `date_trunc` / `extract` for temporal granularity
//! - Native `ilike`

use super::super::fragment::SqlFragment;
use super::helpers;
use super::{PlaceholderStyle, SqlDialect};
use crate::model::Granularity;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn granularity(&self, granularity: Granularity, expr: &SqlFragment) -> SqlFragment {
        helpers::granularity_standard(granularity, expr)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Numbered
    }
}
