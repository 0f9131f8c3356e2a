//! Phase 2: Assembly
//!
//! Turns an [`Expansion`] into a nested [`Statement`]:
//!
//! ```text
//! root:     select <dims coalesced over segments>, <metrics>
//!           from s0 full join s1 on ... | cross join ...
//!           where <metric filters> order by ... limit ? offset ?
//! segment:  select <dims>, <aggregates> from <model> join <model> on ...
//!           where <dimension filters> group by <dims>
//! model:    select <projected columns> from <table or subquery> where <pushed filters>
//! ```

use std::collections::HashMap;

use tracing::debug;

use super::expand::{expand, ConjunctLevel, Expansion, Placement, Segment};
use super::filter::FilterContext;
use super::member::{
    coalesce, merge_projections, render_join_condition, MemberLevel, ModelProjection,
};
use super::session::CompileSession;
use crate::model::ModelSource;
use crate::semantic::error::{SemanticError, SemanticResult};
use crate::semantic::query::{OrderDirection, Query};
use crate::sql::{JoinKind, SortDir, Source, SqlFragment, Statement};

/// Build the statement for `query`.
pub fn build_statement(session: &CompileSession<'_>, query: &Query) -> SemanticResult<Statement> {
    let expansion = expand(session, query)?;

    let subquery = |nested: &Query| -> SemanticResult<Statement> {
        let child = session.fork();
        build_statement(&child, nested)
    };
    let filters = FilterContext {
        dialect: session.dialect(),
        reference_time: session.reference_time(),
        subquery: &subquery,
    };

    let mut segments = Vec::with_capacity(expansion.segments.len());
    for segment in &expansion.segments {
        segments.push(segment_statement(session, &expansion, segment, &filters)?);
    }

    let statement = root_statement(session, &expansion, segments, query, &filters)?;
    debug!(
        segments = expansion.segments.len(),
        models = ?expansion.models(),
        "statement assembled"
    );
    Ok(statement)
}

fn root_statement<'a>(
    session: &CompileSession<'a>,
    expansion: &Expansion<'a>,
    segments: Vec<Statement>,
    query: &Query,
    filters: &FilterContext<'_>,
) -> SemanticResult<Statement> {
    let layout = expansion.root_layout();
    let mut root = Statement::new();

    for member in expansion.dimensions.iter().chain(expansion.metrics.iter()) {
        root = root.select(member.root_projection(session, &layout)?);
    }

    for (k, segment) in segments.into_iter().enumerate() {
        if k == 0 {
            root = root.from(segment);
            continue;
        }
        if expansion.dimensions.is_empty() {
            root = root.cross_join(segment);
            continue;
        }

        // Plain equality: rows whose dimension is NULL do not match across
        // segments and come out once per segment. Postgres only full-joins on
        // hash- or merge-joinable conditions, which rules out
        // `is not distinct from`.
        let previous = &layout.segments()[..k];
        let current = &layout.segments()[k];
        let conditions: Vec<SqlFragment> = expansion
            .dimensions
            .iter()
            .map(|dim| {
                let left = coalesce(
                    previous
                        .iter()
                        .map(|s| session.qualified(s, dim.alias()))
                        .collect(),
                );
                let mut condition = left;
                condition
                    .push_sql(" = ")
                    .append(&session.qualified(current, dim.alias()));
                condition
            })
            .collect();
        root = root.join(JoinKind::Full, segment, SqlFragment::join(&conditions, " and "));
    }

    for conjunct in &expansion.conjuncts {
        if conjunct.level != ConjunctLevel::Root {
            continue;
        }
        let condition = filters.render(&conjunct.node, &mut |path: &str| {
            session
                .member(path)?
                .filter_sql(session, MemberLevel::Root(&layout))
        })?;
        root = root.filter(condition);
    }

    for order in &query.order {
        let member = expansion.requested(&order.0).ok_or_else(|| {
            SemanticError::InvalidQuery(format!(
                "cannot order by '{}': it is not a requested dimension or metric",
                order.0
            ))
        })?;
        let dir = match order.1 {
            OrderDirection::Asc => SortDir::Asc,
            OrderDirection::Desc => SortDir::Desc,
        };
        root = root.order_by(SqlFragment::new(session.quote(member.alias())), dir);
    }

    if let Some(limit) = query.limit {
        root = root.limit(limit);
    }
    if let Some(offset) = query.offset {
        root = root.offset(offset);
    }

    Ok(root)
}

fn segment_statement<'a>(
    session: &CompileSession<'a>,
    expansion: &Expansion<'a>,
    segment: &Segment<'a>,
    filters: &FilterContext<'_>,
) -> SemanticResult<Statement> {
    let mut projections: Vec<ModelProjection> = vec![];
    for member in expansion.dimensions.iter().chain(segment.metrics.iter()) {
        merge_projections(&mut projections, member.model_query_projections(session)?);
    }

    let mut pushed: HashMap<&str, Vec<SqlFragment>> = HashMap::new();
    let mut segment_filters = vec![];
    for placed in &segment.filters {
        let conjunct = &expansion.conjuncts[placed.conjunct];
        match &placed.placement {
            Placement::Model(model) => {
                let condition = filters.render(&conjunct.node, &mut |path: &str| {
                    session.member(path)?.filter_sql(session, MemberLevel::Model)
                })?;
                pushed.entry(model.as_str()).or_default().push(condition);
            }
            Placement::Segment => {
                for member in &conjunct.members {
                    merge_projections(&mut projections, member.model_query_projections(session)?);
                }
                let condition = filters.render(&conjunct.node, &mut |path: &str| {
                    session.member(path)?.filter_sql(session, MemberLevel::Segment)
                })?;
                segment_filters.push(condition);
            }
        }
    }

    let repository = session.repository();
    let mut conditions = Vec::with_capacity(segment.joins.len());
    for join in &segment.joins {
        let declared = repository.join(join.join).ok_or_else(|| {
            SemanticError::JoinPathReconstruction {
                from: join.parent.clone(),
                to: join.child.clone(),
            }
        })?;
        let (condition, needed) = render_join_condition(session, declared)?;
        merge_projections(&mut projections, needed);
        conditions.push(condition);
    }

    let mut build_model = |model: &str| -> SemanticResult<Statement> {
        let conditions = pushed.remove(model).unwrap_or_default();
        model_statement(session, model, &projections, conditions)
    };

    let mut statement = Statement::new().from(build_model(&segment.anchor)?);
    for (join, condition) in segment.joins.iter().zip(conditions) {
        statement = statement.join(join.kind, build_model(&join.child)?, condition);
    }

    for dim in &expansion.dimensions {
        statement = statement.select(dim.segment_projection(session)?);
    }
    for metric in &segment.metrics {
        statement = statement.select(metric.segment_projection(session)?);
    }
    for condition in segment_filters {
        statement = statement.filter(condition);
    }
    for dim in &expansion.dimensions {
        if let Some(expr) = dim.segment_group_by(session)? {
            statement = statement.group_by(expr);
        }
    }

    Ok(statement.with_alias(&segment.alias))
}

/// `select <projections> from <source> as "model" where <pushed filters>`
fn model_statement(
    session: &CompileSession<'_>,
    name: &str,
    projections: &[ModelProjection],
    conditions: Vec<SqlFragment>,
) -> SemanticResult<Statement> {
    let model = session.repository().require_model(name)?;
    let mut statement = Statement::new();

    let own: Vec<&ModelProjection> = projections.iter().filter(|p| p.model == name).collect();
    if own.is_empty() {
        // Nothing is read from this model; keep the statement well formed.
        let key = model.primary_key().ok_or_else(|| {
            SemanticError::InvalidModel(format!("model '{}' has no primary key", name))
        })?;
        let member = session.member(&format!("{}.{}", name, key.name))?;
        for projection in member.model_query_projections(session)? {
            statement = statement.select(projection.select_item());
        }
    } else {
        for projection in own {
            statement = statement.select(projection.select_item());
        }
    }

    let source = match &model.source {
        ModelSource::Table(table) => Source::table(table),
        ModelSource::Subquery(sql) => Source::raw(sql.as_str()),
    };
    statement = statement.from(source.with_alias(name));
    for condition in conditions {
        statement = statement.filter(condition);
    }

    Ok(statement.with_alias(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Cardinality, DeclaredJoinKind, Dimension, DimensionType, Join, Metric, Model, SqlTemplate,
    };
    use crate::semantic::planner::filter::{FilterNode, FilterOperator};
    use crate::semantic::repository::Repository;
    use crate::sql::Dialect;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn repository() -> Repository {
        Repository::builder()
            .model(
                Model::new("user")
                    .table("Table")
                    .dimension(Dimension::new("user_id", DimensionType::Number).primary_key())
                    .dimension(Dimension::new("first_name", DimensionType::String))
                    .metric(Metric::new("count", |_| {
                        SqlTemplate::new()
                            .sql("COUNT(DISTINCT ")
                            .column("CustomerId")
                            .sql(")")
                    })),
            )
            .model(
                Model::new("orders")
                    .subquery("select * from raw_orders")
                    .dimension(Dimension::new("id", DimensionType::Number).primary_key())
                    .dimension(Dimension::new("user_id", DimensionType::Number))
                    .metric(Metric::new("total", |_| {
                        SqlTemplate::new().sql("sum(").column("amount").sql(")")
                    })),
            )
            .join(
                Join::new("orders", "user", Cardinality::ManyToOne, |args| {
                    SqlTemplate::new()
                        .part(args.from_dimension("user_id"))
                        .sql(" = ")
                        .part(args.to_dimension("user_id"))
                })
                .with_kind(DeclaredJoinKind::Inner),
            )
            .build()
            .unwrap()
    }

    fn render(query: &Query) -> SemanticResult<SqlFragment> {
        let repo = repository();
        let context = Value::Null;
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let session = CompileSession::new(&repo, Dialect::Ansi, &context, now);
        Ok(build_statement(&session, query)?.render(Dialect::Ansi))
    }

    #[test]
    fn test_single_segment() {
        let out = render(&Query::new().dimension("user.first_name").metric("user.count")).unwrap();
        assert_eq!(
            out.sql,
            "select \"s0\".\"user___first_name\" as \"user___first_name\", \"s0\".\"user___count\" as \"user___count\" \
             from (select \"user\".\"user___first_name\" as \"user___first_name\", COUNT(DISTINCT \"user\".\"user___count___CustomerId\") as \"user___count\" \
             from (select \"user\".\"first_name\" as \"user___first_name\", \"user\".\"CustomerId\" as \"user___count___CustomerId\" from \"Table\" as \"user\") as \"user\" \
             group by \"user\".\"user___first_name\") as \"s0\""
        );
        assert!(out.bindings.is_empty());
    }

    #[test]
    fn test_two_segments_full_join_on_dimensions() {
        let out = render(
            &Query::new()
                .dimension("user.first_name")
                .metric("orders.total")
                .metric("user.count"),
        )
        .unwrap();
        assert!(out.sql.starts_with(
            "select coalesce(\"s0\".\"user___first_name\", \"s1\".\"user___first_name\") as \"user___first_name\""
        ));
        assert!(out.sql.contains(
            "full join (select \"user\".\"user___first_name\" as \"user___first_name\", COUNT(DISTINCT"
        ));
        assert!(out
            .sql
            .ends_with("on \"s0\".\"user___first_name\" = \"s1\".\"user___first_name\""));
        assert!(out.sql.contains("from (select * from raw_orders) as \"orders\""));
        assert!(out.sql.contains(
            "inner join (select \"user\".\"first_name\" as \"user___first_name\", \"user\".\"user_id\" as \"user___user_id\" from \"Table\" as \"user\") as \"user\" \
             on \"orders\".\"orders___user_id\" = \"user\".\"user___user_id\""
        ));
    }

    #[test]
    fn test_segments_match_dimensions_with_plain_equality() {
        let out = render(
            &Query::new()
                .dimension("user.first_name")
                .dimension("user.user_id")
                .metric("orders.total")
                .metric("user.count"),
        )
        .unwrap();
        assert!(out.sql.ends_with(
            "on \"s0\".\"user___first_name\" = \"s1\".\"user___first_name\" \
             and \"s0\".\"user___user_id\" = \"s1\".\"user___user_id\""
        ));
        assert!(!out.sql.contains("distinct from"));
    }

    #[test]
    fn test_metrics_without_dimensions_cross_join() {
        let out = render(&Query::new().metric("orders.total").metric("user.count")).unwrap();
        assert!(out.sql.contains(") as \"s0\" cross join (select"));
        assert!(!out.sql.contains("group by"));
    }

    #[test]
    fn test_filters_are_placed_by_level() {
        let query = Query::new()
            .dimension("user.first_name")
            .metric("user.count")
            .filter(FilterNode::and(vec![
                FilterNode::leaf(FilterOperator::Equals, "user.first_name", json!("Ann")),
                FilterNode::leaf(FilterOperator::Gt, "user.count", json!(10)),
            ]))
            .limit(5);
        let out = render(&query).unwrap();

        assert!(out
            .sql
            .contains("from \"Table\" as \"user\" where \"user\".\"first_name\" = ?) as \"user\""));
        assert!(out.sql.contains("where \"s0\".\"user___count\" > ? limit ?"));
        assert_eq!(out.bindings, vec![json!("Ann"), json!(10), json!(5)]);
    }

    #[test]
    fn test_order_by_alias() {
        let query = Query::new()
            .dimension("user.first_name")
            .metric("user.count")
            .order("user.count", OrderDirection::Desc);
        let out = render(&query).unwrap();
        assert!(out.sql.ends_with("order by \"user___count\" desc"));
    }

    #[test]
    fn test_order_by_unrequested_member_fails() {
        let query = Query::new()
            .dimension("user.first_name")
            .order("user.count", OrderDirection::Asc);
        assert!(matches!(render(&query), Err(SemanticError::InvalidQuery(_))));
    }

    #[test]
    fn test_offset_without_limit() {
        let out = render(&Query::new().dimension("user.first_name").offset(20)).unwrap();
        assert!(out.sql.ends_with("group by \"user\".\"user___first_name\") as \"s0\" offset ?"));
        assert_eq!(out.bindings, vec![json!(20)]);
    }

    #[test]
    fn test_in_query_filter() {
        let nested = json!({"dimensions": ["orders.user_id"]});
        let query = Query::new()
            .dimension("user.first_name")
            .filter(FilterNode::leaf(FilterOperator::InQuery, "user.user_id", nested));
        let out = render(&query).unwrap();
        assert!(out.sql.contains(
            "where \"user\".\"user_id\" in (select \"s0\".\"orders___user_id\" as \"orders___user_id\" from"
        ));
    }

    #[test]
    fn test_in_query_requires_one_member() {
        let nested = json!({"dimensions": ["orders.user_id", "orders.id"]});
        let query = Query::new()
            .dimension("user.first_name")
            .filter(FilterNode::leaf(FilterOperator::InQuery, "user.user_id", nested));
        assert!(matches!(
            render(&query),
            Err(SemanticError::InvalidFilter { .. })
        ));
    }
}
