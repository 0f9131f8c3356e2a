//! Databricks (Spark SQL) dialect.
//!
//! Databricks features:
//! - Backtick identifier quoting
//! - Positional `?` parameters
//! - Spark datetime functions (`to_date`, `quarter`, `weekofyear`, ...)
//! - `ilike` (Spark 3.3+)

use super::super::fragment::SqlFragment;
use super::helpers;
use super::{PlaceholderStyle, SqlDialect};
use crate::model::Granularity;

/// Databricks (Spark SQL) dialect.
#[derive(Debug, Clone, Copy)]
pub struct Databricks;

impl SqlDialect for Databricks {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn granularity(&self, granularity: Granularity, expr: &SqlFragment) -> SqlFragment {
        match granularity {
            Granularity::Time => expr.wrap("date_format(", ", 'HH:mm:ss')"),
            Granularity::Date => helpers::call("to_date", expr),
            Granularity::Year => helpers::date_trunc("YEAR", expr),
            Granularity::Quarter => helpers::date_trunc("QUARTER", expr),
            Granularity::QuarterOfYear => helpers::call("quarter", expr),
            Granularity::Month => helpers::date_trunc("MONTH", expr),
            Granularity::MonthNum => helpers::call("month", expr),
            Granularity::Week => helpers::date_trunc("WEEK", expr),
            Granularity::WeekNum => helpers::call("weekofyear", expr),
            Granularity::DayOfMonth => helpers::call("dayofmonth", expr),
            Granularity::Hour => helpers::date_trunc("HOUR", expr),
            Granularity::HourOfDay => helpers::call("hour", expr),
            Granularity::Minute => helpers::date_trunc("MINUTE", expr),
        }
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Positional
    }
}
