//! Unified error types for the semantic layer.
//!
//! Every failure in the compile pipeline is fatal: repository construction,
//! member resolution, join planning, filter validation and date parsing all
//! report through [`SemanticError`]. There is no partial-result mode.

use thiserror::Error;

/// Result type for semantic operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Unified error type for the semantic layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    /// Member path is malformed or does not resolve.
    #[error("Member '{path}' not found: {reason}")]
    MemberNotFound { path: String, reason: String },

    /// Referenced a model that doesn't exist.
    #[error("Unknown model: '{0}'")]
    UnknownModel(String),

    /// Invalid model configuration.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// A second join was declared between the same pair of models.
    #[error("Duplicate join between '{from}' and '{to}'")]
    DuplicateJoin { from: String, to: String },

    /// Could not find a join path between models.
    #[error("No join path from '{from}' to '{to}'")]
    NoPath { from: String, to: String },

    /// Predecessor chain broke while rebuilding a shortest path.
    #[error("Join path reconstruction failed between '{from}' and '{to}'")]
    JoinPathReconstruction { from: String, to: String },

    /// Granularity tag outside the fixed set.
    #[error("Unknown granularity: '{0}'")]
    UnknownGranularity(String),

    /// Invalid reference inside a SQL template.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Member templates reference each other in a cycle.
    #[error("Cyclic reference detected: {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),

    /// Filter payload failed its operator's validation.
    #[error("Invalid '{operator}' filter on '{member}': {reason}")]
    InvalidFilter {
        operator: String,
        member: String,
        reason: String,
    },

    /// Date input could not be parsed by any strategy.
    #[error("Unparseable date: '{0}'")]
    UnparseableDate(String),

    /// Request is structurally invalid.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl SemanticError {
    pub(crate) fn member_not_found(path: &str, reason: impl Into<String>) -> Self {
        SemanticError::MemberNotFound {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
