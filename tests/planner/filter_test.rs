//! Tests for filter validation and rendering.

use chrono::{NaiveDate, NaiveDateTime};
use semlayer::semantic::planner::FilterContext;
use semlayer::semantic::{FilterNode, FilterOperator, Query, SemanticError, SemanticResult};
use semlayer::sql::{Dialect, SqlDialect, SqlFragment, Statement};
use serde_json::{json, Value};

fn reference() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 15)
        .unwrap()
        .and_hms_opt(13, 30, 0)
        .unwrap()
}

fn no_subqueries(_: &Query) -> SemanticResult<Statement> {
    Err(SemanticError::InvalidQuery("subqueries are not available".into()))
}

/// Render against bare column names: `user.first_name` → `"first_name"`.
fn render_with(dialect: Dialect, node: &FilterNode) -> SemanticResult<SqlFragment> {
    let ctx = FilterContext {
        dialect,
        reference_time: reference(),
        subquery: &no_subqueries,
    };
    ctx.render(node, &mut |path: &str| {
        let column = path.rsplit('.').next().unwrap_or(path);
        Ok(SqlFragment::new(dialect.quote_identifier(column)))
    })
}

fn render(json: Value) -> SemanticResult<SqlFragment> {
    let node: FilterNode = serde_json::from_value(json).unwrap();
    render_with(Dialect::Ansi, &node)
}

// ============================================================================
// Equality
// ============================================================================

#[test]
fn test_single_value_equals() {
    let out = render(json!({"operator": "equals", "member": "user.id", "value": [7]})).unwrap();
    assert_eq!(out.sql, "\"id\" = ?");
    assert_eq!(out.bindings, vec![json!(7)]);
}

#[test]
fn test_many_values_equals_is_in_list() {
    let out = render(json!({"operator": "equals", "member": "user.id", "value": [3, 1, 2]}))
        .unwrap();
    assert_eq!(out.sql, "\"id\" in (?, ?, ?)");
    assert_eq!(out.bindings, vec![json!(3), json!(1), json!(2)]);
}

#[test]
fn test_not_equals() {
    let out = render(json!({"operator": "notEquals", "member": "user.id", "value": [1, 2]}))
        .unwrap();
    assert_eq!(out.sql, "\"id\" not in (?, ?)");
}

#[test]
fn test_set_and_not_set() {
    let out = render(json!({"operator": "set", "member": "user.email"})).unwrap();
    assert_eq!(out.sql, "\"email\" is not null");
    assert!(out.bindings.is_empty());

    let out = render(json!({"operator": "notSet", "member": "user.email"})).unwrap();
    assert_eq!(out.sql, "\"email\" is null");
}

// ============================================================================
// Patterns
// ============================================================================

#[test]
fn test_contains_renders_ored_ilike() {
    let node = FilterNode::leaf(
        FilterOperator::Contains,
        "user.first_name",
        json!(["Jo", "An"]),
    );
    let out = render_with(Dialect::default(), &node).unwrap();
    assert_eq!(
        out.sql,
        "(\"first_name\" ilike '%' || ? || '%' or \"first_name\" ilike '%' || ? || '%')"
    );
    assert_eq!(out.bindings, vec![json!("Jo"), json!("An")]);
}

#[test]
fn test_negated_patterns_are_anded() {
    let out = render(json!({
        "operator": "notContains",
        "member": "user.first_name",
        "value": ["x", "y"]
    }))
    .unwrap();
    assert!(out.sql.contains(" not ilike "));
    assert!(out.sql.contains(" and "));
    assert!(!out.sql.contains(" or "));
}

#[test]
fn test_databricks_quotes_with_backticks() {
    let node = FilterNode::leaf(FilterOperator::EndsWith, "user.first_name", json!(["son"]));
    let out = render_with(Dialect::Databricks, &node).unwrap();
    assert!(out.sql.starts_with("`first_name` ilike "));
}

// ============================================================================
// Dates
// ============================================================================

#[test]
fn test_in_date_range_with_bounds() {
    let out = render(json!({
        "operator": "inDateRange",
        "member": "user.created",
        "value": ["2024-01-01", "2024-01-31"]
    }))
    .unwrap();
    assert_eq!(out.sql, "\"created\" between ? and ?");
    assert_eq!(
        out.bindings,
        vec![json!("2024-01-01T00:00:00.000"), json!("2024-01-31T23:59:59.999")]
    );
}

#[test]
fn test_relative_range_phrases() {
    let out = render(json!({
        "operator": "notInDateRange",
        "member": "user.created",
        "value": "this month"
    }))
    .unwrap();
    assert_eq!(out.sql, "\"created\" not between ? and ?");
    assert_eq!(
        out.bindings,
        vec![json!("2024-05-01T00:00:00.000"), json!("2024-05-31T23:59:59.999")]
    );
}

#[test]
fn test_before_and_after_date() {
    let out = render(json!({
        "operator": "beforeDate",
        "member": "user.created",
        "value": "2024-03-10"
    }))
    .unwrap();
    assert_eq!(out.sql, "\"created\" < ?");
    assert_eq!(out.bindings, vec![json!("2024-03-10T00:00:00.000")]);

    let out = render(json!({
        "operator": "afterDate",
        "member": "user.created",
        "value": "2024-03-10"
    }))
    .unwrap();
    assert_eq!(out.sql, "\"created\" > ?");
    assert_eq!(out.bindings, vec![json!("2024-03-10T23:59:59.999")]);
}

#[test]
fn test_unparseable_date() {
    let err = render(json!({
        "operator": "inDateRange",
        "member": "user.created",
        "value": "the day after the party"
    }))
    .unwrap_err();
    assert!(matches!(err, SemanticError::UnparseableDate(_)));
}

#[test]
fn test_date_at_calendar_edge_is_unparseable() {
    for operator in ["beforeDate", "afterDate", "inDateRange"] {
        let err = render(json!({
            "operator": operator,
            "member": "user.created",
            "value": "+262142-12-31"
        }))
        .unwrap_err();
        assert_eq!(err, SemanticError::UnparseableDate("+262142-12-31".into()));
    }
}

// ============================================================================
// Groups and Validation
// ============================================================================

#[test]
fn test_nested_groups() {
    let out = render(json!({
        "operator": "or",
        "filters": [
            {"operator": "gt", "member": "user.age", "value": [65]},
            {"operator": "and", "filters": [
                {"operator": "lt", "member": "user.age", "value": [18]},
                {"operator": "set", "member": "user.guardian"}
            ]}
        ]
    }))
    .unwrap();
    assert_eq!(
        out.sql,
        "(\"age\" > ? or (\"age\" < ? and \"guardian\" is not null))"
    );
    assert_eq!(out.bindings, vec![json!(65), json!(18)]);
}

#[test]
fn test_payload_validation() {
    let cases = [
        json!({"operator": "equals", "member": "user.id"}),
        json!({"operator": "equals", "member": "user.id", "value": []}),
        json!({"operator": "contains", "member": "user.name", "value": [1]}),
        json!({"operator": "set", "member": "user.id", "value": [1]}),
        json!({"operator": "inDateRange", "member": "user.created", "value": ["a", "b", "c"]}),
        json!({"operator": "and", "filters": [{"operator": "or", "filters": []}]}),
    ];
    for case in cases {
        let err = render(case.clone()).unwrap_err();
        assert!(
            matches!(err, SemanticError::InvalidFilter { .. }),
            "expected InvalidFilter for {}, got {:?}",
            case,
            err
        );
    }
}

#[test]
fn test_unknown_operator_fails_to_decode() {
    let result: Result<FilterNode, _> =
        serde_json::from_value(json!({"operator": "like", "member": "user.id", "value": ["x"]}));
    assert!(result.is_err());
}

#[test]
fn test_in_query_uses_subquery_compiler() {
    let node = FilterNode::leaf(
        FilterOperator::InQuery,
        "user.id",
        json!({"dimensions": ["orders.user_id"]}),
    );
    let err = render_with(Dialect::Ansi, &node).unwrap_err();
    assert_eq!(
        err,
        SemanticError::InvalidQuery("subqueries are not available".into())
    );
}
