//! Filter trees: validation and rendering.
//!
//! A filter is either a leaf (`operator`, `member`, `value`) or a logical
//! group (`and`/`or` over child filters). Leaves are validated against their
//! operator's payload shape before any SQL is produced, then rendered against
//! a member fragment supplied by the caller, so the same filter can target the
//! model, segment, or root level.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dates::{self, DateRange};
use crate::semantic::error::{SemanticError, SemanticResult};
use crate::semantic::query::Query;
use crate::sql::{Dialect, PatternMatch, SqlFragment, Statement};

/// Connective of a filter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
        }
    }
}

/// Leaf filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Gt,
    Gte,
    Lt,
    Lte,
    Set,
    NotSet,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    BeforeDate,
    AfterDate,
    InDateRange,
    NotInDateRange,
    InQuery,
    NotInQuery,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "notEquals",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Set => "set",
            FilterOperator::NotSet => "notSet",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "notContains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::NotStartsWith => "notStartsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::NotEndsWith => "notEndsWith",
            FilterOperator::BeforeDate => "beforeDate",
            FilterOperator::AfterDate => "afterDate",
            FilterOperator::InDateRange => "inDateRange",
            FilterOperator::NotInDateRange => "notInDateRange",
            FilterOperator::InQuery => "inQuery",
            FilterOperator::NotInQuery => "notInQuery",
        }
    }

    fn pattern(&self) -> Option<PatternMatch> {
        match self {
            FilterOperator::Contains => Some(PatternMatch::contains()),
            FilterOperator::NotContains => Some(PatternMatch::contains().negate()),
            FilterOperator::StartsWith => Some(PatternMatch::starts_with()),
            FilterOperator::NotStartsWith => Some(PatternMatch::starts_with().negate()),
            FilterOperator::EndsWith => Some(PatternMatch::ends_with()),
            FilterOperator::NotEndsWith => Some(PatternMatch::ends_with().negate()),
            _ => None,
        }
    }

    fn comparison(&self) -> Option<&'static str> {
        match self {
            FilterOperator::Gt => Some(">"),
            FilterOperator::Gte => Some(">="),
            FilterOperator::Lt => Some("<"),
            FilterOperator::Lte => Some("<="),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of a filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Group(FilterGroup),
    Leaf(FilterLeaf),
}

/// `and`/`or` over child filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterGroup {
    pub operator: LogicalOperator,
    pub filters: Vec<FilterNode>,
}

/// One operator applied to one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterLeaf {
    pub operator: FilterOperator,
    pub member: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FilterNode {
    pub fn leaf(operator: FilterOperator, member: &str, value: impl Into<Value>) -> Self {
        FilterNode::Leaf(FilterLeaf {
            operator,
            member: member.into(),
            value: Some(value.into()),
        })
    }

    /// A leaf without a payload (`set`, `notSet`).
    pub fn unary(operator: FilterOperator, member: &str) -> Self {
        FilterNode::Leaf(FilterLeaf {
            operator,
            member: member.into(),
            value: None,
        })
    }

    pub fn and(filters: Vec<FilterNode>) -> Self {
        FilterNode::Group(FilterGroup {
            operator: LogicalOperator::And,
            filters,
        })
    }

    pub fn or(filters: Vec<FilterNode>) -> Self {
        FilterNode::Group(FilterGroup {
            operator: LogicalOperator::Or,
            filters,
        })
    }

    /// Member paths referenced by leaves, in order, without duplicates.
    pub fn members(&self) -> Vec<&str> {
        let mut out = vec![];
        self.collect_members(&mut out);
        out
    }

    fn collect_members<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterNode::Leaf(leaf) => {
                if !out.contains(&leaf.member.as_str()) {
                    out.push(&leaf.member);
                }
            }
            FilterNode::Group(group) => {
                for child in &group.filters {
                    child.collect_members(out);
                }
            }
        }
    }

    /// Split into top-level conjuncts. Nested `and` groups are flattened; an
    /// empty top-level `and` yields no conjuncts.
    pub fn conjuncts(&self) -> Vec<FilterNode> {
        match self {
            FilterNode::Group(FilterGroup {
                operator: LogicalOperator::And,
                filters,
            }) => filters.iter().flat_map(|f| f.conjuncts()).collect(),
            other => vec![other.clone()],
        }
    }

    /// Validate every leaf and reject empty nested groups.
    pub fn validate(&self) -> SemanticResult<()> {
        match self {
            FilterNode::Leaf(leaf) => leaf.validate().map(|_| ()),
            FilterNode::Group(group) => {
                if group.filters.is_empty() {
                    return Err(empty_group(group.operator));
                }
                group.filters.iter().try_for_each(|f| f.validate())
            }
        }
    }
}

fn empty_group(operator: LogicalOperator) -> SemanticError {
    SemanticError::InvalidFilter {
        operator: operator.as_str().into(),
        member: String::new(),
        reason: "filter group has no children".into(),
    }
}

/// Date payload of a date-range filter.
#[derive(Debug, Clone, PartialEq)]
pub enum DateInput {
    /// One expression resolving to a range (`"last week"`).
    Phrase(String),
    /// Explicit `[start, end]`.
    Bounds(String, String),
}

/// A validated filter payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    None,
    Values(Vec<Value>),
    Strings(Vec<String>),
    Date(String),
    DateRange(DateInput),
    Query(Box<Query>),
}

/// A leaf whose payload matched its operator.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFilter<'a> {
    pub operator: FilterOperator,
    pub member: &'a str,
    pub value: FilterValue,
}

impl FilterLeaf {
    fn invalid(&self, reason: impl Into<String>) -> SemanticError {
        SemanticError::InvalidFilter {
            operator: self.operator.as_str().into(),
            member: self.member.clone(),
            reason: reason.into(),
        }
    }

    /// Check the payload shape for the operator.
    pub fn validate(&self) -> SemanticResult<ValidatedFilter<'_>> {
        use FilterOperator::*;

        let value = match self.operator {
            Set | NotSet => match &self.value {
                None => FilterValue::None,
                Some(_) => return Err(self.invalid("operator takes no value")),
            },
            Equals | NotEquals | In | NotIn | Gt | Gte | Lt | Lte => {
                let values = self.scalars()?;
                FilterValue::Values(values)
            }
            Contains | NotContains | StartsWith | NotStartsWith | EndsWith | NotEndsWith => {
                let values = self.scalars()?;
                let strings = values
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(s),
                        _ => Err(self.invalid("expected string values")),
                    })
                    .collect::<SemanticResult<Vec<_>>>()?;
                FilterValue::Strings(strings)
            }
            BeforeDate | AfterDate => {
                let mut strings = self.date_strings()?;
                if strings.len() != 1 {
                    return Err(self.invalid("expected a single date"));
                }
                FilterValue::Date(strings.remove(0))
            }
            InDateRange | NotInDateRange => {
                let strings = self.date_strings()?;
                match <[String; 2]>::try_from(strings) {
                    Ok([start, end]) => FilterValue::DateRange(DateInput::Bounds(start, end)),
                    Err(mut strings) if strings.len() == 1 => {
                        FilterValue::DateRange(DateInput::Phrase(strings.remove(0)))
                    }
                    Err(_) => return Err(self.invalid("expected a date phrase or [start, end]")),
                }
            }
            InQuery | NotInQuery => {
                let raw = self
                    .value
                    .clone()
                    .ok_or_else(|| self.invalid("expected a nested query"))?;
                let query: Query = serde_json::from_value(raw)
                    .map_err(|e| self.invalid(format!("invalid nested query: {}", e)))?;
                FilterValue::Query(Box::new(query))
            }
        };

        Ok(ValidatedFilter {
            operator: self.operator,
            member: &self.member,
            value,
        })
    }

    /// A scalar or a non-empty array of scalars.
    fn scalars(&self) -> SemanticResult<Vec<Value>> {
        let values = match &self.value {
            None | Some(Value::Null) => return Err(self.invalid("missing value")),
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        };
        if values.is_empty() {
            return Err(self.invalid("expected at least one value"));
        }
        if let Some(bad) = values
            .iter()
            .find(|v| !matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        {
            return Err(self.invalid(format!("unsupported value {}", bad)));
        }
        Ok(values)
    }

    fn date_strings(&self) -> SemanticResult<Vec<String>> {
        let items = match &self.value {
            Some(Value::String(s)) => return Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items,
            _ => return Err(self.invalid("expected a date string or array of date strings")),
        };
        items
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                _ => Err(self.invalid("expected date strings")),
            })
            .collect()
    }
}

/// Compiles the statement of a nested `inQuery` request.
pub type SubqueryCompiler<'a> = dyn Fn(&Query) -> SemanticResult<Statement> + 'a;

/// What leaf rendering needs besides the member fragment.
pub struct FilterContext<'a> {
    pub dialect: Dialect,
    pub reference_time: NaiveDateTime,
    pub subquery: &'a SubqueryCompiler<'a>,
}

impl FilterContext<'_> {
    /// Render a tree. `member_sql` maps a member path to its SQL at the
    /// target level.
    pub fn render(
        &self,
        node: &FilterNode,
        member_sql: &mut dyn FnMut(&str) -> SemanticResult<SqlFragment>,
    ) -> SemanticResult<SqlFragment> {
        match node {
            FilterNode::Leaf(leaf) => {
                let filter = leaf.validate()?;
                let expr = member_sql(&leaf.member)?;
                self.render_leaf(&filter, &expr)
            }
            FilterNode::Group(group) => {
                let parts = group
                    .filters
                    .iter()
                    .map(|child| self.render(child, member_sql))
                    .collect::<SemanticResult<Vec<_>>>()?;
                match parts.len() {
                    0 => Err(empty_group(group.operator)),
                    1 => Ok(parts.into_iter().next().unwrap_or_default()),
                    _ => {
                        let separator = format!(" {} ", group.operator.as_str());
                        Ok(SqlFragment::join(&parts, &separator).parenthesize())
                    }
                }
            }
        }
    }

    /// Render one validated leaf against `expr`.
    pub fn render_leaf(
        &self,
        filter: &ValidatedFilter<'_>,
        expr: &SqlFragment,
    ) -> SemanticResult<SqlFragment> {
        use FilterOperator::*;

        let invalid = |reason: &str| SemanticError::InvalidFilter {
            operator: filter.operator.as_str().into(),
            member: filter.member.into(),
            reason: reason.into(),
        };

        let out = match (&filter.value, filter.operator) {
            (FilterValue::None, Set) => expr.wrap("", " is not null"),
            (FilterValue::None, NotSet) => expr.wrap("", " is null"),

            (FilterValue::Values(values), Equals | In) => membership(expr, values, false),
            (FilterValue::Values(values), NotEquals | NotIn) => membership(expr, values, true),

            (FilterValue::Values(values), op) => {
                let symbol = op.comparison().ok_or_else(|| invalid("not a comparison"))?;
                let parts: Vec<SqlFragment> = values
                    .iter()
                    .map(|v| {
                        let mut part = expr.wrap("", &format!(" {} ", symbol));
                        part.append(&SqlFragment::binding(v.clone()));
                        part
                    })
                    .collect();
                combine(parts, " and ")
            }

            (FilterValue::Strings(strings), op) => {
                let pattern = op.pattern().ok_or_else(|| invalid("not a pattern match"))?;
                let parts: Vec<SqlFragment> = strings
                    .iter()
                    .map(|s| {
                        self.dialect
                            .dialect()
                            .pattern_match(expr, pattern, Value::String(s.clone()))
                    })
                    .collect();
                let separator = if pattern.negated { " and " } else { " or " };
                combine(parts, separator)
            }

            (FilterValue::Date(input), op) => {
                let range = dates::parse_date(input, self.reference_time)?;
                match op {
                    BeforeDate => compare(expr, "<", range.start_binding()),
                    AfterDate => compare(expr, ">", range.end_binding()),
                    _ => return Err(invalid("not a date comparison")),
                }
            }

            (FilterValue::DateRange(input), op) => {
                let range = match input {
                    DateInput::Phrase(phrase) => dates::parse_date(phrase, self.reference_time)?,
                    DateInput::Bounds(start, end) => {
                        dates::parse_bounds(start, end, self.reference_time)?
                    }
                };
                between(expr, &range, op == NotInDateRange)
            }

            (FilterValue::Query(query), op) => {
                let statement = (self.subquery)(query.as_ref())?;
                if statement.select.len() != 1 {
                    return Err(invalid("nested query must project exactly one member"));
                }
                let keyword = if op == NotInQuery { " not in " } else { " in " };
                let mut out = expr.wrap("", keyword);
                out.append(&statement.render(self.dialect).parenthesize());
                out
            }

            (FilterValue::None, _) => return Err(invalid("missing value")),
        };

        Ok(out)
    }
}

/// `expr = ?` or `expr in (?, ?)`, negated as `<>` / `not in`.
fn membership(expr: &SqlFragment, values: &[Value], negated: bool) -> SqlFragment {
    if let [single] = values {
        let op = if negated { "<>" } else { "=" };
        return compare(expr, op, single.clone());
    }
    let markers: Vec<SqlFragment> = values
        .iter()
        .map(|v| SqlFragment::binding(v.clone()))
        .collect();
    let keyword = if negated { " not in " } else { " in " };
    let mut out = expr.wrap("", keyword);
    out.append(&SqlFragment::join(&markers, ", ").parenthesize());
    out
}

fn compare(expr: &SqlFragment, op: &str, value: impl Into<Value>) -> SqlFragment {
    let mut out = expr.wrap("", &format!(" {} ", op));
    out.append(&SqlFragment::binding(value));
    out
}

fn between(expr: &SqlFragment, range: &DateRange, negated: bool) -> SqlFragment {
    let keyword = if negated { " not between " } else { " between " };
    let mut out = expr.wrap("", keyword);
    out.append(&SqlFragment::binding(range.start_binding()))
        .push_sql(" and ")
        .append(&SqlFragment::binding(range.end_binding()));
    out
}

/// Join with `separator`, parenthesized when there is more than one part.
fn combine(parts: Vec<SqlFragment>, separator: &str) -> SqlFragment {
    if parts.len() == 1 {
        return parts.into_iter().next().unwrap_or_default();
    }
    SqlFragment::join(&parts, separator).parenthesize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn reference() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn no_subqueries(_: &Query) -> SemanticResult<Statement> {
        Err(SemanticError::InvalidQuery("no subqueries here".into()))
    }

    fn render(node: FilterNode) -> SemanticResult<SqlFragment> {
        let ctx = FilterContext {
            dialect: Dialect::Postgres,
            reference_time: reference(),
            subquery: &no_subqueries,
        };
        ctx.render(&node, &mut |path: &str| {
            let column = path.rsplit('.').next().unwrap_or(path);
            Ok(SqlFragment::new(format!("\"{}\"", column)))
        })
    }

    #[test]
    fn test_contains_two_values() {
        let out = render(FilterNode::leaf(
            FilterOperator::Contains,
            "user.first_name",
            json!(["Jo", "An"]),
        ))
        .unwrap();
        assert_eq!(
            out.sql,
            "(\"first_name\" ilike '%' || ? || '%' or \"first_name\" ilike '%' || ? || '%')"
        );
        assert_eq!(out.bindings, vec![json!("Jo"), json!("An")]);
    }

    #[test]
    fn test_negated_pattern_uses_and() {
        let out = render(FilterNode::leaf(
            FilterOperator::NotStartsWith,
            "user.name",
            json!(["a", "b"]),
        ))
        .unwrap();
        assert_eq!(
            out.sql,
            "(\"name\" not ilike ? || '%' and \"name\" not ilike ? || '%')"
        );
    }

    #[test]
    fn test_equals_single_and_many() {
        let one = render(FilterNode::leaf(FilterOperator::Equals, "t.a", json!(1))).unwrap();
        assert_eq!(one.sql, "\"a\" = ?");

        let many = render(FilterNode::leaf(
            FilterOperator::NotEquals,
            "t.a",
            json!([1, 2, 3]),
        ))
        .unwrap();
        assert_eq!(many.sql, "\"a\" not in (?, ?, ?)");
        assert_eq!(many.bindings.len(), 3);
    }

    #[test]
    fn test_set_and_not_set() {
        assert_eq!(
            render(FilterNode::unary(FilterOperator::Set, "t.a")).unwrap().sql,
            "\"a\" is not null"
        );
        assert_eq!(
            render(FilterNode::unary(FilterOperator::NotSet, "t.a")).unwrap().sql,
            "\"a\" is null"
        );
    }

    #[test]
    fn test_date_filters() {
        let before = render(FilterNode::leaf(
            FilterOperator::BeforeDate,
            "t.created",
            json!("2024-01-31"),
        ))
        .unwrap();
        assert_eq!(before.sql, "\"created\" < ?");
        assert_eq!(before.bindings, vec![json!("2024-01-31T00:00:00.000")]);

        let after = render(FilterNode::leaf(
            FilterOperator::AfterDate,
            "t.created",
            json!("2024-01-31"),
        ))
        .unwrap();
        assert_eq!(after.bindings, vec![json!("2024-01-31T23:59:59.999")]);

        let range = render(FilterNode::leaf(
            FilterOperator::InDateRange,
            "t.created",
            json!(["2024-01-01", "2024-01-31"]),
        ))
        .unwrap();
        assert_eq!(range.sql, "\"created\" between ? and ?");
        assert_eq!(
            range.bindings,
            vec![
                json!("2024-01-01T00:00:00.000"),
                json!("2024-01-31T23:59:59.999")
            ]
        );

        let phrase = render(FilterNode::leaf(
            FilterOperator::NotInDateRange,
            "t.created",
            json!("yesterday"),
        ))
        .unwrap();
        assert_eq!(phrase.sql, "\"created\" not between ? and ?");
        assert_eq!(phrase.bindings[0], json!("2024-05-14T00:00:00.000"));
    }

    #[test]
    fn test_unparseable_date() {
        let err = render(FilterNode::leaf(
            FilterOperator::BeforeDate,
            "t.created",
            json!("sometime"),
        ))
        .unwrap_err();
        assert_eq!(err, SemanticError::UnparseableDate("sometime".into()));
    }

    #[test]
    fn test_groups_parenthesize() {
        let out = render(FilterNode::or(vec![
            FilterNode::leaf(FilterOperator::Equals, "t.a", json!(1)),
            FilterNode::and(vec![
                FilterNode::leaf(FilterOperator::Gt, "t.b", json!(2)),
                FilterNode::leaf(FilterOperator::Lte, "t.c", json!(3)),
            ]),
        ]))
        .unwrap();
        assert_eq!(out.sql, "(\"a\" = ? or (\"b\" > ? and \"c\" <= ?))");
        assert_eq!(out.bindings, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_single_child_group_is_unwrapped() {
        let out = render(FilterNode::and(vec![FilterNode::leaf(
            FilterOperator::Lt,
            "t.a",
            json!(5),
        )]))
        .unwrap();
        assert_eq!(out.sql, "\"a\" < ?");
    }

    #[test]
    fn test_empty_nested_group_is_invalid() {
        let node = FilterNode::and(vec![FilterNode::or(vec![])]);
        assert!(matches!(
            node.validate(),
            Err(SemanticError::InvalidFilter { .. })
        ));
        assert!(FilterNode::and(vec![]).conjuncts().is_empty());
    }

    #[test]
    fn test_invalid_payloads() {
        let cases = vec![
            FilterNode::unary(FilterOperator::Equals, "t.a"),
            FilterNode::leaf(FilterOperator::Equals, "t.a", json!([])),
            FilterNode::leaf(FilterOperator::Contains, "t.a", json!([1])),
            FilterNode::leaf(FilterOperator::Set, "t.a", json!(1)),
            FilterNode::leaf(FilterOperator::InDateRange, "t.a", json!(["a", "b", "c"])),
            FilterNode::leaf(FilterOperator::Gt, "t.a", json!({"x": 1})),
        ];
        for node in cases {
            assert!(
                matches!(node.validate(), Err(SemanticError::InvalidFilter { .. })),
                "{:?}",
                node
            );
        }
    }

    #[test]
    fn test_conjuncts_flatten_nested_and() {
        let node = FilterNode::and(vec![
            FilterNode::leaf(FilterOperator::Equals, "t.a", json!(1)),
            FilterNode::and(vec![
                FilterNode::leaf(FilterOperator::Equals, "t.b", json!(1)),
                FilterNode::or(vec![
                    FilterNode::leaf(FilterOperator::Equals, "t.c", json!(1)),
                    FilterNode::leaf(FilterOperator::Equals, "t.a", json!(2)),
                ]),
            ]),
        ]);
        let conjuncts = node.conjuncts();
        assert_eq!(conjuncts.len(), 3);
        assert_eq!(conjuncts[2].members(), vec!["t.c", "t.a"]);
        assert_eq!(node.members(), vec!["t.a", "t.b", "t.c"]);
    }

    #[test]
    fn test_deserialize_leaf_and_group() {
        let node: FilterNode = serde_json::from_value(json!({
            "operator": "or",
            "filters": [
                {"operator": "startsWith", "member": "t.a", "value": "x"},
                {"operator": "notSet", "member": "t.b"}
            ]
        }))
        .unwrap();
        let FilterNode::Group(group) = node else {
            panic!("expected a group");
        };
        assert_eq!(group.operator, LogicalOperator::Or);
        assert!(matches!(
            &group.filters[0],
            FilterNode::Leaf(FilterLeaf {
                operator: FilterOperator::StartsWith,
                ..
            })
        ));
    }
}
