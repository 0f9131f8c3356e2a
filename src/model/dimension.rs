//! Dimensions: non-aggregated attributes of a model.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::template::{MemberSqlArgs, MemberSqlFn, SqlTemplate};
use super::Format;

/// Value type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Datetime,
    Time,
}

impl DimensionType {
    /// Whether granularity members can be derived from this type.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            DimensionType::Date | DimensionType::Datetime | DimensionType::Time
        )
    }
}

impl fmt::Display for DimensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DimensionType::String => "string",
            DimensionType::Number => "number",
            DimensionType::Boolean => "boolean",
            DimensionType::Date => "date",
            DimensionType::Datetime => "datetime",
            DimensionType::Time => "time",
        };
        write!(f, "{}", s)
    }
}

/// A non-aggregated, queryable attribute.
#[derive(Clone)]
pub struct Dimension {
    pub name: String,
    pub ty: DimensionType,
    pub primary_key: bool,
    pub format: Option<Format>,
    /// Definition; `None` reads the column of the same name.
    pub sql: Option<MemberSqlFn>,
}

impl Dimension {
    pub fn new(name: &str, ty: DimensionType) -> Self {
        Self {
            name: name.into(),
            ty,
            primary_key: false,
            format: None,
            sql: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_sql<F>(mut self, f: F) -> Self
    where
        F: Fn(&MemberSqlArgs<'_>) -> SqlTemplate + Send + Sync + 'static,
    {
        self.sql = Some(Arc::new(f));
        self
    }

    /// Evaluate the definition.
    pub fn template(&self, args: &MemberSqlArgs<'_>) -> SqlTemplate {
        match &self.sql {
            Some(f) => f(args),
            None => SqlTemplate::new().column(&self.name),
        }
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dimension")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("primary_key", &self.primary_key)
            .field("format", &self.format)
            .field("sql", &self.sql.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
