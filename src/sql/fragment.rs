//! Compiled SQL fragments.
//!
//! A [`SqlFragment`] is SQL text written against the dialect-neutral binding
//! marker `?` plus the values bound to those markers, in order. A literal `?`
//! that must survive placeholder translation is written as `\?`.
//!
//! Fragments compose by concatenation: text is appended and bindings are
//! appended in the same order, so the n-th marker always lines up with the
//! n-th binding.

use serde_json::Value;

/// The dialect-neutral binding marker.
pub const BINDING_MARKER: char = '?';

/// Opening character of a string literal or quoted identifier. A doubled
/// quote inside a run closes and reopens it, which keeps the scan in step.
pub fn is_quote(c: char) -> bool {
    matches!(c, '\'' | '"' | '`')
}

/// SQL text plus positionally aligned bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl SqlFragment {
    /// A fragment with no bindings.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: vec![],
        }
    }

    /// A fragment with explicit bindings.
    pub fn with_bindings(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// A single bound value: `?`.
    pub fn binding(value: impl Into<Value>) -> Self {
        Self {
            sql: BINDING_MARKER.to_string(),
            bindings: vec![value.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Append raw SQL text.
    pub fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append another fragment, text and bindings.
    pub fn append(&mut self, other: &SqlFragment) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.bindings.extend(other.bindings.iter().cloned());
        self
    }

    /// Wrap the fragment as `prefix <sql> suffix`.
    pub fn wrap(&self, prefix: &str, suffix: &str) -> Self {
        Self {
            sql: format!("{}{}{}", prefix, self.sql, suffix),
            bindings: self.bindings.clone(),
        }
    }

    /// Wrap the fragment in parentheses.
    pub fn parenthesize(&self) -> Self {
        self.wrap("(", ")")
    }

    /// Join fragments with a separator, keeping binding order.
    pub fn join<'a>(fragments: impl IntoIterator<Item = &'a SqlFragment>, separator: &str) -> Self {
        let mut out = SqlFragment::default();
        for (i, fragment) in fragments.into_iter().enumerate() {
            if i > 0 {
                out.sql.push_str(separator);
            }
            out.append(fragment);
        }
        out
    }

    /// Count of unescaped binding markers outside of string literals and
    /// quoted identifiers.
    pub fn marker_count(&self) -> usize {
        let mut count = 0;
        let mut quote: Option<char> = None;
        let mut chars = self.sql.chars().peekable();
        while let Some(c) = chars.next() {
            match quote {
                Some(open) if c == open => quote = None,
                Some(_) => {}
                None if is_quote(c) => quote = Some(c),
                None if c == '\\' && chars.peek() == Some(&BINDING_MARKER) => {
                    chars.next();
                }
                None if c == BINDING_MARKER => count += 1,
                None => {}
            }
        }
        count
    }
}

impl From<&str> for SqlFragment {
    fn from(sql: &str) -> Self {
        SqlFragment::new(sql)
    }
}

impl From<String> for SqlFragment {
    fn from(sql: String) -> Self {
        SqlFragment::new(sql)
    }
}

impl std::fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql)
    }
}
