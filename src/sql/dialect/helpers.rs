//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use serde_json::Value;

use super::super::fragment::{is_quote, SqlFragment, BINDING_MARKER};
use super::super::token::{Token, TokenStream};
use super::PlaceholderStyle;
use crate::model::Granularity;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: ANSI, Postgres, DuckDB
pub fn quote_double(ident: &str) -> String {
    if ident == "*" {
        return ident.to_string();
    }
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: Databricks
pub fn quote_backtick(ident: &str) -> String {
    if ident == "*" {
        return ident.to_string();
    }
    format!("`{}`", ident.replace('`', "``"))
}

// =============================================================================
// Temporal Expressions
// =============================================================================

/// `date_trunc('<unit>', expr)`
pub fn date_trunc(unit: &str, expr: &SqlFragment) -> SqlFragment {
    expr.wrap(&format!("date_trunc('{}', ", unit), ")")
}

/// `extract(<field> from expr)`
pub fn extract(field: &str, expr: &SqlFragment) -> SqlFragment {
    expr.wrap(&format!("extract({} from ", field), ")")
}

/// `date_part('<field>', expr)`
pub fn date_part(field: &str, expr: &SqlFragment) -> SqlFragment {
    expr.wrap(&format!("date_part('{}', ", field), ")")
}

/// `cast(expr as <ty>)`
pub fn cast(expr: &SqlFragment, ty: &str) -> SqlFragment {
    expr.wrap("cast(", &format!(" as {})", ty))
}

/// `<name>(expr)`
pub fn call(name: &str, expr: &SqlFragment) -> SqlFragment {
    expr.wrap(&format!("{}(", name), ")")
}

/// Standard `date_trunc`/`extract` granularity rendering.
/// Used by: ANSI, Postgres
pub fn granularity_standard(granularity: Granularity, expr: &SqlFragment) -> SqlFragment {
    match granularity {
        Granularity::Time => cast(expr, "time"),
        Granularity::Date => cast(expr, "date"),
        Granularity::Year => date_trunc("year", expr),
        Granularity::Quarter => date_trunc("quarter", expr),
        Granularity::QuarterOfYear => extract("quarter", expr),
        Granularity::Month => date_trunc("month", expr),
        Granularity::MonthNum => extract("month", expr),
        Granularity::Week => date_trunc("week", expr),
        Granularity::WeekNum => extract("week", expr),
        Granularity::DayOfMonth => extract("day", expr),
        Granularity::Hour => date_trunc("hour", expr),
        Granularity::HourOfDay => extract("hour", expr),
        Granularity::Minute => date_trunc("minute", expr),
    }
}

// =============================================================================
// Placeholders
// =============================================================================

/// Translate neutral `?` markers to the given placeholder style.
///
/// Markers inside string literals and quoted identifiers are left alone. For numbered styles
/// an escaped `\?` is emitted as a literal `?`; positional dialects keep the
/// text unchanged since `?` is already their native marker.
pub fn translate_placeholders(sql: &str, style: PlaceholderStyle) -> String {
    if style == PlaceholderStyle::Positional {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(open) if c == open => {
                quote = None;
                out.push(c);
            }
            Some(_) => out.push(c),
            None if is_quote(c) => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '\\' && chars.peek() == Some(&BINDING_MARKER) => {
                chars.next();
                out.push(BINDING_MARKER);
            }
            None if c == BINDING_MARKER => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            None => out.push(c),
        }
    }
    out
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit `limit ? offset ?` with both values bound.
/// Used by: all dialects
pub fn emit_limit_offset_standard(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(lim) = limit {
        ts.push(Token::Limit)
            .space()
            .push(Token::Binding(Value::from(lim)));
    }

    if let Some(off) = offset {
        if limit.is_some() {
            ts.space();
        }
        ts.push(Token::Offset)
            .space()
            .push(Token::Binding(Value::from(off)));
    }

    ts
}
