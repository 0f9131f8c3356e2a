//! Tests for query expansion: segments, join orientation and filter placement.

use chrono::NaiveDate;
use semlayer::model::{
    Cardinality, DeclaredJoinKind, Dimension, DimensionType, Join, Metric, Model, SqlTemplate,
};
use semlayer::semantic::planner::{expand, ConjunctLevel, Placement};
use semlayer::semantic::{CompileSession, FilterNode, FilterOperator, Query, Repository};
use semlayer::sql::{Dialect, JoinKind};
use serde_json::{json, Value};

fn sum(name: &str, column: &'static str) -> Metric {
    Metric::new(name, move |_| SqlTemplate::new().sql("sum(").column(column).sql(")"))
}

fn equals(left: &'static str, right: &'static str) -> impl Fn(&semlayer::model::JoinSqlArgs<'_>) -> SqlTemplate {
    move |args| {
        SqlTemplate::new()
            .part(args.from_dimension(left))
            .sql(" = ")
            .part(args.to_dimension(right))
    }
}

/// ```text
/// orders ─N:1 (left)─ user ─N:1 (inner)─ country
///                      │
/// payments ─N:1 (full)─┘
/// ```
fn repository() -> Repository {
    Repository::builder()
        .model(
            Model::new("user")
                .dimension(Dimension::new("id", DimensionType::Number).primary_key())
                .dimension(Dimension::new("name", DimensionType::String))
                .dimension(Dimension::new("country_id", DimensionType::Number))
                .metric(sum("sum_age", "age"))
                .metric(Metric::new("order_total", |_| {
                    SqlTemplate::new().metric("orders.total")
                }))
                .metric(Metric::new("countries", |_| {
                    SqlTemplate::new()
                        .sql("count(distinct ")
                        .dimension("country.name")
                        .sql(")")
                })),
        )
        .model(
            Model::new("country")
                .dimension(Dimension::new("id", DimensionType::Number).primary_key())
                .dimension(Dimension::new("name", DimensionType::String)),
        )
        .model(
            Model::new("orders")
                .dimension(Dimension::new("id", DimensionType::Number).primary_key())
                .dimension(Dimension::new("user_id", DimensionType::Number))
                .metric(sum("total", "amount")),
        )
        .model(
            Model::new("payments")
                .dimension(Dimension::new("id", DimensionType::Number).primary_key())
                .dimension(Dimension::new("user_id", DimensionType::Number))
                .metric(sum("paid", "amount")),
        )
        .join(Join::new(
            "orders",
            "user",
            Cardinality::ManyToOne,
            equals("user_id", "id"),
        ))
        .join(
            Join::new("user", "country", Cardinality::ManyToOne, equals("country_id", "id"))
                .with_kind(DeclaredJoinKind::Inner),
        )
        .join(
            Join::new("payments", "user", Cardinality::ManyToOne, equals("user_id", "id"))
                .with_kind(DeclaredJoinKind::Full),
        )
        .build()
        .unwrap()
}

fn session<'r>(repo: &'r Repository, context: &'r Value) -> CompileSession<'r> {
    let now = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    CompileSession::new(repo, Dialect::Ansi, context, now)
}

#[test]
fn test_each_metric_model_anchors_a_segment() {
    let repo = repository();
    let context = Value::Null;
    let s = session(&repo, &context);
    let query = Query::new()
        .dimension("country.name")
        .metric("orders.total")
        .metric("payments.paid");
    let expansion = expand(&s, &query).unwrap();

    let aliases: Vec<&str> = expansion.segments.iter().map(|s| s.alias.as_str()).collect();
    assert_eq!(aliases, vec!["s0", "s1"]);
    assert_eq!(expansion.segments[0].anchor, "orders");
    assert_eq!(expansion.segments[1].anchor, "payments");
    assert_eq!(expansion.segments[0].required, vec!["orders", "country"]);
}

#[test]
fn test_joins_are_oriented_from_the_anchor() {
    let repo = repository();
    let context = Value::Null;
    let s = session(&repo, &context);
    let query = Query::new()
        .dimension("country.name")
        .metric("orders.total")
        .metric("payments.paid");
    let expansion = expand(&s, &query).unwrap();

    let orders: Vec<(&str, &str, JoinKind)> = expansion.segments[0]
        .joins
        .iter()
        .map(|j| (j.parent.as_str(), j.child.as_str(), j.kind))
        .collect();
    assert_eq!(
        orders,
        vec![
            ("orders", "user", JoinKind::Left),
            ("user", "country", JoinKind::Inner),
        ]
    );

    let payments: Vec<(&str, &str, JoinKind)> = expansion.segments[1]
        .joins
        .iter()
        .map(|j| (j.parent.as_str(), j.child.as_str(), j.kind))
        .collect();
    assert_eq!(
        payments,
        vec![
            ("payments", "user", JoinKind::Full),
            ("user", "country", JoinKind::Inner),
        ]
    );

    assert_eq!(expansion.join_models(), vec!["user"]);
    assert_eq!(
        expansion.models(),
        vec!["orders", "country", "user", "payments"]
    );
}

#[test]
fn test_filter_behind_outer_join_stays_on_segment() {
    let repo = repository();
    let context = Value::Null;
    let s = session(&repo, &context);
    let query = Query::new()
        .dimension("user.name")
        .metric("orders.total")
        .filter(FilterNode::leaf(
            FilterOperator::Equals,
            "country.name",
            json!("NZ"),
        ));
    let expansion = expand(&s, &query).unwrap();

    assert_eq!(expansion.conjuncts[0].level, ConjunctLevel::Dimension);
    assert_eq!(expansion.segments[0].filters[0].placement, Placement::Segment);
}

#[test]
fn test_filter_behind_inner_join_is_pushed_down() {
    let repo = repository();
    let context = Value::Null;
    let s = session(&repo, &context);
    let query = Query::new()
        .dimension("user.name")
        .filter(FilterNode::and(vec![
            FilterNode::leaf(FilterOperator::Equals, "country.name", json!("NZ")),
            FilterNode::leaf(FilterOperator::StartsWith, "user.name", json!(["A"])),
        ]));
    let expansion = expand(&s, &query).unwrap();

    assert_eq!(expansion.segments.len(), 1);
    assert_eq!(expansion.segments[0].anchor, "user");
    let placements: Vec<&Placement> = expansion.segments[0]
        .filters
        .iter()
        .map(|f| &f.placement)
        .collect();
    assert_eq!(
        placements,
        vec![
            &Placement::Model("country".into()),
            &Placement::Model("user".into())
        ]
    );
}

#[test]
fn test_or_across_models_is_one_segment_conjunct() {
    let repo = repository();
    let context = Value::Null;
    let s = session(&repo, &context);
    let query = Query::new()
        .dimension("user.name")
        .filter(FilterNode::or(vec![
            FilterNode::leaf(FilterOperator::Equals, "country.name", json!("NZ")),
            FilterNode::leaf(FilterOperator::Equals, "user.name", json!("Ann")),
        ]));
    let expansion = expand(&s, &query).unwrap();

    assert_eq!(expansion.conjuncts.len(), 1);
    assert_eq!(expansion.segments[0].filters[0].placement, Placement::Segment);
}

#[test]
fn test_duplicate_members_are_collapsed() {
    let repo = repository();
    let context = Value::Null;
    let s = session(&repo, &context);
    let query = Query::new()
        .dimension("user.name")
        .dimension("user.name")
        .metric("orders.total")
        .metric("orders.total");
    let expansion = expand(&s, &query).unwrap();

    assert_eq!(expansion.dimensions.len(), 1);
    assert_eq!(expansion.metrics.len(), 1);
    assert_eq!(s.cached_members(), 2);
}

#[test]
fn test_metric_reaching_across_fan_out_gets_own_segment() {
    let repo = repository();
    let context = Value::Null;
    let s = session(&repo, &context);
    let query = Query::new()
        .dimension("user.name")
        .metric("user.sum_age")
        .metric("user.order_total")
        .metric("user.countries");
    let expansion = expand(&s, &query).unwrap();

    let segments: Vec<(&str, Vec<&str>)> = expansion
        .segments
        .iter()
        .map(|seg| {
            (
                seg.anchor.as_str(),
                seg.metrics.iter().map(|m| m.path()).collect(),
            )
        })
        .collect();
    assert_eq!(
        segments,
        vec![
            ("user", vec!["user.sum_age", "user.countries"]),
            ("user", vec!["user.order_total"]),
        ]
    );

    // The many-to-one lookup stays with the plain metric; orders does not.
    assert_eq!(expansion.segments[0].required, vec!["user", "country"]);
    assert!(!expansion.segments[0].tree.contains("orders"));
    assert_eq!(expansion.segments[1].required, vec!["user", "orders"]);
    assert_eq!(
        expansion.root_layout().segment_of("user___order_total"),
        Some("s1")
    );
}
