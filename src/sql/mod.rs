//! SQL generation module.
//!
//! This module provides the rendering side of the compiler:
//!
//! - [`fragment`] - SQL text plus ordered bindings
//! - [`query`] - nested SELECT statement builder
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod fragment;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, PatternMatch, PlaceholderStyle, SqlDialect};
pub use fragment::{SqlFragment, BINDING_MARKER};
pub use query::{Join, JoinKind, Layout, OrderByItem, SelectItem, SortDir, Source, Statement};
pub use token::{Token, TokenStream};
