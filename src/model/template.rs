//! SQL templates produced by member and join definitions.
//!
//! A definition function does not return finished SQL. It returns a
//! [`SqlTemplate`]: literal SQL interleaved with typed references (columns,
//! other members, bound values). The compiler resolves references per nesting
//! level, which is what lets the same metric read `"user"."CustomerId"` at the
//! model level and `"user"."user___count___CustomerId"` one level up.

use std::sync::Arc;

use serde_json::Value;

/// One piece of a [`SqlTemplate`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlPart {
    /// Literal SQL, emitted verbatim.
    Sql(String),
    /// A bound value, emitted as `?`.
    Value(Value),
    /// A quoted identifier.
    Identifier(String),
    /// A column of the owning model's source.
    Column(String),
    /// A dimension, by local name or `model.dimension` path.
    Dimension(String),
    /// A metric, by local name or `model.metric` path.
    Metric(String),
}

/// Literal SQL interleaved with references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlTemplate {
    pub parts: Vec<SqlPart>,
}

impl SqlTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, part: SqlPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn sql(self, sql: &str) -> Self {
        self.part(SqlPart::Sql(sql.into()))
    }

    pub fn value(self, value: impl Into<Value>) -> Self {
        self.part(SqlPart::Value(value.into()))
    }

    pub fn identifier(self, name: &str) -> Self {
        self.part(SqlPart::Identifier(name.into()))
    }

    pub fn column(self, name: &str) -> Self {
        self.part(SqlPart::Column(name.into()))
    }

    pub fn dimension(self, path: &str) -> Self {
        self.part(SqlPart::Dimension(path.into()))
    }

    pub fn metric(self, path: &str) -> Self {
        self.part(SqlPart::Metric(path.into()))
    }
}

impl From<SqlPart> for SqlTemplate {
    fn from(part: SqlPart) -> Self {
        SqlTemplate { parts: vec![part] }
    }
}

impl From<&str> for SqlTemplate {
    fn from(sql: &str) -> Self {
        SqlTemplate::new().sql(sql)
    }
}

/// Arguments passed to a member definition.
#[derive(Debug, Clone, Copy)]
pub struct MemberSqlArgs<'a> {
    /// Name of the model that owns the member.
    pub model: &'a str,
    /// Opaque per-compile context (row-level predicates, tenant ids, ...).
    pub context: &'a Value,
}

/// Arguments passed to a join condition.
#[derive(Debug, Clone, Copy)]
pub struct JoinSqlArgs<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub context: &'a Value,
}

impl JoinSqlArgs<'_> {
    /// `SqlPart` for a dimension of the `from` model.
    pub fn from_dimension(&self, name: &str) -> SqlPart {
        SqlPart::Dimension(format!("{}.{}", self.from, name))
    }

    /// `SqlPart` for a dimension of the `to` model.
    pub fn to_dimension(&self, name: &str) -> SqlPart {
        SqlPart::Dimension(format!("{}.{}", self.to, name))
    }
}

/// Member definition function.
pub type MemberSqlFn = Arc<dyn Fn(&MemberSqlArgs<'_>) -> SqlTemplate + Send + Sync>;

/// Join condition function.
pub type JoinSqlFn = Arc<dyn Fn(&JoinSqlArgs<'_>) -> SqlTemplate + Send + Sync>;
