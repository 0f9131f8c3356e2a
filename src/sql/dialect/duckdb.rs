//! DuckDB SQL dialect.
//!
//! DuckDB features:
//! - ANSI identifier quoting (`"`)
//! - Postgres-style numbered parameters (`$1`, `$2`, ...)
//! - `date_part` for numeric extraction

use super::super::fragment::SqlFragment;
use super::helpers;
use super::{PlaceholderStyle, SqlDialect};
use crate::model::Granularity;

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn granularity(&self, granularity: Granularity, expr: &SqlFragment) -> SqlFragment {
        match granularity {
            Granularity::Time => helpers::cast(expr, "time"),
            Granularity::Date => helpers::cast(expr, "date"),
            Granularity::Year => helpers::date_trunc("year", expr),
            Granularity::Quarter => helpers::date_trunc("quarter", expr),
            Granularity::QuarterOfYear => helpers::date_part("quarter", expr),
            Granularity::Month => helpers::date_trunc("month", expr),
            Granularity::MonthNum => helpers::date_part("month", expr),
            Granularity::Week => helpers::date_trunc("week", expr),
            Granularity::WeekNum => helpers::date_part("week", expr),
            Granularity::DayOfMonth => helpers::date_part("day", expr),
            Granularity::Hour => helpers::date_trunc("hour", expr),
            Granularity::HourOfDay => helpers::date_part("hour", expr),
            Granularity::Minute => helpers::date_trunc("minute", expr),
        }
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Numbered
    }
}
