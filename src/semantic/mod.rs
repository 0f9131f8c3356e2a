//! Semantic layer - repository, join planning, and query compilation.
//!
//! Users declare models (a table or subquery plus dimensions and metrics)
//! and joins between them. The [`Repository`] validates the declarations and
//! builds the weighted join graph once; every compile then reads it without
//! mutation.
//!
//! A compile turns a [`Query`] into SQL:
//!
//! 1. **Expand** - resolve members, partition into segments, plan joins
//! 2. **Assemble** - nest model statements in segments, segments in a root
//!
//! See [`planner`] for the phases and [`graph`] for join selection.

pub mod error;
pub mod graph;
pub mod planner;
pub mod query;
pub mod repository;

pub use error::{SemanticError, SemanticResult};
pub use graph::{optimize, JoinGraph, JoinTree, JoinTreeEdge};
pub use planner::{CompileSession, FilterNode, FilterOperator, LogicalOperator, QueryMember};
pub use query::{OrderDirection, OrderSpec, Query};
pub use repository::{alias_for, Member, MemberKind, Repository, RepositoryBuilder};
