//! Joins: declared relationships between two models.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::template::{JoinSqlArgs, JoinSqlFn, SqlTemplate};

/// Cardinality of a relationship between models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    /// One-to-one relationship
    OneToOne,
    /// One-to-many relationship
    OneToMany,
    /// Many-to-one relationship
    ManyToOne,
    /// Many-to-many relationship
    ManyToMany,
}

impl Cardinality {
    /// Reverse the cardinality (swap left/right sides).
    pub fn reverse(self) -> Self {
        match self {
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// Returns true if this cardinality can cause row multiplication.
    /// One-to-many and many-to-many can fan out.
    pub fn causes_fanout(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::OneToOne => write!(f, "1:1"),
            Cardinality::OneToMany => write!(f, "1:N"),
            Cardinality::ManyToOne => write!(f, "N:1"),
            Cardinality::ManyToMany => write!(f, "N:N"),
        }
    }
}

/// Join priority; lower priority makes an edge more expensive to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Explicit join kind. Undeclared joins render as `left join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredJoinKind {
    Inner,
    Full,
}

/// Static edge-weight table: `WEIGHT[priority][cardinality]`.
///
/// Fan-out cardinalities and low priority cost more.
pub fn join_weight(priority: Priority, cardinality: Cardinality) -> u32 {
    let base = match cardinality {
        Cardinality::OneToOne => 1,
        Cardinality::ManyToOne => 2,
        Cardinality::OneToMany => 3,
        Cardinality::ManyToMany => 4,
    };
    let factor = match priority {
        Priority::High => 1,
        Priority::Normal => 10,
        Priority::Low => 100,
    };
    base * factor
}

/// A directed join declaration between two models.
#[derive(Clone)]
pub struct Join {
    pub from: String,
    pub to: String,
    pub cardinality: Cardinality,
    pub priority: Priority,
    pub kind: Option<DeclaredJoinKind>,
    pub condition: JoinSqlFn,
}

impl Join {
    pub fn new<F>(from: &str, to: &str, cardinality: Cardinality, condition: F) -> Self
    where
        F: Fn(&JoinSqlArgs<'_>) -> SqlTemplate + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            to: to.into(),
            cardinality,
            priority: Priority::default(),
            kind: None,
            condition: Arc::new(condition),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_kind(mut self, kind: DeclaredJoinKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn weight(&self) -> u32 {
        join_weight(self.priority, self.cardinality)
    }

    /// Cardinality seen when traversing from `model` to the other side.
    pub fn cardinality_from(&self, model: &str) -> Cardinality {
        if model == self.from {
            self.cardinality
        } else {
            self.cardinality.reverse()
        }
    }

    /// Evaluate the condition.
    pub fn template(&self, context: &serde_json::Value) -> SqlTemplate {
        (self.condition)(&JoinSqlArgs {
            from: &self.from,
            to: &self.to,
            context,
        })
    }
}

impl fmt::Debug for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Join")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cardinality", &self.cardinality)
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
