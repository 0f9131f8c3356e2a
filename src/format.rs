//! Query introspection and result formatting.
//!
//! Execution happens outside the compiler. Given the rows a driver returns
//! (keyed by member alias), [`format_rows`] attaches a display string to every
//! cell whose member declares a [`Format`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::model::DimensionType;
use crate::semantic::{alias_for, MemberKind, Query, Repository, SemanticResult};

/// Caller-supplied formatting function.
pub type FormatFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Display format of a member's values.
#[derive(Clone)]
pub enum Format {
    /// `{v}%`
    Percentage,
    /// `${v}`
    Currency,
    Custom(FormatFn),
}

impl Format {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        Format::Custom(Arc::new(f))
    }

    /// Name of a built-in format, as written in schema files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "percentage" => Some(Format::Percentage),
            "currency" => Some(Format::Currency),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Percentage => "percentage",
            Format::Currency => "currency",
            Format::Custom(_) => "custom",
        }
    }

    /// Render a raw value.
    pub fn apply(&self, value: &Value) -> String {
        match self {
            Format::Percentage => format!("{}%", display_value(value)),
            Format::Currency => format!("${}", display_value(value)),
            Format::Custom(f) => f(value),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Custom(_) => write!(f, "Custom(<fn>)"),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ============================================================================
// Introspection
// ============================================================================

/// What a result column holds.
#[derive(Debug, Clone, Serialize)]
pub struct MemberInfo {
    pub path: String,
    pub kind: MemberKind,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<DimensionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
}

/// Result columns of a query, keyed by alias.
pub type Introspection = BTreeMap<String, MemberInfo>;

/// Describe every projected column of `query`.
pub fn introspect(repository: &Repository, query: &Query) -> SemanticResult<Introspection> {
    let mut columns = Introspection::new();
    for path in query.dimensions.iter().chain(&query.metrics) {
        let member = repository.get_member(path)?;
        let path = member.path();
        columns.insert(
            alias_for(&path),
            MemberInfo {
                path,
                kind: member.kind(),
                ty: member.ty(),
                format: member.format().cloned(),
            },
        );
    }
    Ok(columns)
}

// ============================================================================
// Formatting
// ============================================================================

/// A result cell with its optional display string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedCell {
    pub value: Value,
    #[serde(rename = "formattedValue", skip_serializing_if = "Option::is_none")]
    pub formatted_value: Option<String>,
}

/// Attach display strings to raw rows.
///
/// Null values and columns without a format are passed through unformatted.
pub fn format_rows(
    rows: &[Map<String, Value>],
    introspection: &Introspection,
) -> Vec<BTreeMap<String, FormattedCell>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|(alias, value)| {
                    let formatted_value = introspection
                        .get(alias)
                        .and_then(|info| info.format.as_ref())
                        .filter(|_| !value.is_null())
                        .map(|format| format.apply(value));
                    let cell = FormattedCell {
                        value: value.clone(),
                        formatted_value,
                    };
                    (alias.clone(), cell)
                })
                .collect()
        })
        .collect()
}
