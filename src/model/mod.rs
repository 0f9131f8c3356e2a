//! Semantic model types.
//!
//! A [`Model`] binds a named unit to a base table or subquery and owns its
//! dimensions and metrics. Models and [`Join`]s are declared once, handed to
//! [`crate::semantic::Repository`], and never mutated afterwards.

pub mod dimension;
pub mod granularity;
pub mod join;
pub mod loader;
pub mod metric;
pub mod template;

pub use crate::format::Format;
pub use dimension::{Dimension, DimensionType};
pub use granularity::Granularity;
pub use join::{join_weight, Cardinality, DeclaredJoinKind, Join, Priority};
pub use metric::{AdHocAggregate, Metric};
pub use template::{JoinSqlArgs, MemberSqlArgs, SqlPart, SqlTemplate};

/// What a model reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Table name, optionally dot-qualified (`schema.table`).
    Table(String),
    /// SQL subquery text.
    Subquery(String),
}

/// A named data unit exposing dimensions and metrics.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub source: ModelSource,
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
}

impl Model {
    /// A model over a table of the same name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            source: ModelSource::Table(name.into()),
            dimensions: vec![],
            metrics: vec![],
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.source = ModelSource::Table(table.into());
        self
    }

    pub fn subquery(mut self, sql: &str) -> Self {
        self.source = ModelSource::Subquery(sql.into());
        self
    }

    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn get_dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn get_metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// The primary-key dimension. Repository construction guarantees one.
    pub fn primary_key(&self) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.primary_key)
    }
}
