//! # semlayer
//!
//! A semantic layer that compiles analytic queries to multi-dialect SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Models + Joins (Rust builders or TOML)          │
//! │     (dimensions, metrics, granularities, conditions)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [repository]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Repository (validated, weighted join graph)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner: expand]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Segments (one per metric model) + placed filters       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner: assemble]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Nested statement: model → segment → root               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [dialect]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 SQL text + bindings                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Compilation is pure: no I/O, and each call owns its state, so one
//! [`semantic::Repository`] can serve concurrent compiles.

pub mod compile;
pub mod config;
pub mod format;
pub mod model;
pub mod semantic;
pub mod sql;

// Re-export SQL submodules at crate level
pub use sql::dialect;
pub use sql::query;
pub use sql::token;

/// Common imports for building schemas and compiling queries.
pub mod prelude {
    pub use crate::compile::{compile, compile_json, CompileError, CompileOptions, CompiledQuery};
    pub use crate::format::{format_rows, introspect, Format};
    pub use crate::model::{
        Cardinality, DeclaredJoinKind, Dimension, DimensionType, Granularity, Join, Metric, Model,
        Priority, SqlTemplate,
    };
    pub use crate::semantic::{
        FilterNode, FilterOperator, OrderDirection, Query, Repository, SemanticError,
    };
    pub use crate::sql::Dialect;
}
