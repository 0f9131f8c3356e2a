//! ANSI SQL dialect - base reference implementation.
//!
//! This provides the ANSI SQL standard behavior as a reference.
//! Bindings are passed through as `?`.

use super::super::fragment::SqlFragment;
use super::helpers;
use super::{PlaceholderStyle, SqlDialect};
use crate::model::Granularity;

/// ANSI SQL dialect (reference implementation).
#[derive(Debug, Clone, Copy)]
pub struct Ansi;

impl SqlDialect for Ansi {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn granularity(&self, granularity: Granularity, expr: &SqlFragment) -> SqlFragment {
        helpers::granularity_standard(granularity, expr)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Positional
    }
}
