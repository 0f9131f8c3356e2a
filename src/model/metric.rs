//! Metrics: aggregated or derived expressions of a model.

use std::fmt;
use std::sync::Arc;

use super::template::{MemberSqlArgs, MemberSqlFn, SqlTemplate};
use super::Format;

/// An aggregated, queryable expression.
///
/// The definition is evaluated per compile with the compile context, so a
/// metric can splice in row-level predicates or other context-bound values.
#[derive(Clone)]
pub struct Metric {
    pub name: String,
    pub format: Option<Format>,
    pub sql: MemberSqlFn,
}

impl Metric {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&MemberSqlArgs<'_>) -> SqlTemplate + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            format: None,
            sql: Arc::new(f),
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Evaluate the definition.
    pub fn template(&self, args: &MemberSqlArgs<'_>) -> SqlTemplate {
        (self.sql)(args)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Aggregate applied by an ad-hoc metric (`model.dimension.adhoc_<fn>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdHocAggregate {
    Count,
    CountDistinct,
    Sum,
    Min,
    Max,
    Avg,
}

impl AdHocAggregate {
    pub const PREFIX: &'static str = "adhoc_";

    pub const ALL: [AdHocAggregate; 6] = [
        AdHocAggregate::Count,
        AdHocAggregate::CountDistinct,
        AdHocAggregate::Sum,
        AdHocAggregate::Min,
        AdHocAggregate::Max,
        AdHocAggregate::Avg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdHocAggregate::Count => "count",
            AdHocAggregate::CountDistinct => "count_distinct",
            AdHocAggregate::Sum => "sum",
            AdHocAggregate::Min => "min",
            AdHocAggregate::Max => "max",
            AdHocAggregate::Avg => "avg",
        }
    }

    /// Parse the member suffix, `adhoc_<fn>`.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let name = suffix.strip_prefix(Self::PREFIX)?;
        Self::ALL.iter().copied().find(|a| a.as_str() == name)
    }

    /// Wrap an expression in the aggregate.
    pub fn apply(&self, expr: &str) -> String {
        match self {
            AdHocAggregate::Count => format!("count({})", expr),
            AdHocAggregate::CountDistinct => format!("count(distinct {})", expr),
            AdHocAggregate::Sum => format!("sum({})", expr),
            AdHocAggregate::Min => format!("min({})", expr),
            AdHocAggregate::Max => format!("max({})", expr),
            AdHocAggregate::Avg => format!("avg({})", expr),
        }
    }
}

impl fmt::Display for AdHocAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.as_str())
    }
}
