//! Query planner.
//!
//! Compilation runs in two phases over a per-compile [`CompileSession`]:
//!
//! 1. **Expand** - resolve members, split filters, partition into segments
//!    and plan the joins of each segment
//! 2. **Assemble** - build the nested model / segment / root statement
//!
//! Members render themselves per level ([`QueryMember`]); filters render
//! against whatever member SQL the level supplies ([`FilterContext`]).

pub mod assemble;
pub mod dates;
pub mod expand;
pub mod filter;
pub mod member;
pub mod session;

pub use assemble::build_statement;
pub use dates::{parse_date, DateRange};
pub use expand::{expand, Conjunct, ConjunctLevel, Expansion, Placement, Segment, SegmentJoin};
pub use filter::{
    FilterContext, FilterGroup, FilterLeaf, FilterNode, FilterOperator, FilterValue,
    LogicalOperator,
};
pub use member::{MemberLevel, ModelProjection, QueryMember, RootLayout};
pub use session::CompileSession;
