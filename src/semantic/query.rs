//! The analytic request.
//!
//! ```json
//! {
//!   "dimensions": ["user.first_name"],
//!   "metrics": ["user.count"],
//!   "filters": {"operator": "contains", "member": "user.first_name", "value": ["Jo"]},
//!   "order": [["user.count", "desc"]],
//!   "limit": 10,
//!   "offset": 20
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::planner::filter::FilterNode;

/// Sort direction of an order entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// `[path, direction]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec(pub String, pub OrderDirection);

/// An immutable analytic request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[must_use = "builders have no effect until used"]
pub struct Query {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterNode>,
    pub order: Vec<OrderSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(mut self, path: &str) -> Self {
        self.dimensions.push(path.into());
        self
    }

    pub fn metric(mut self, path: &str) -> Self {
        self.metrics.push(path.into());
        self
    }

    pub fn filter(mut self, node: FilterNode) -> Self {
        self.filters = Some(node);
        self
    }

    pub fn order(mut self, path: &str, direction: OrderDirection) -> Self {
        self.order.push(OrderSpec(path.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Parse a request from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
