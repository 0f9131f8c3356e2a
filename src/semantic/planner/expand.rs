//! Phase 1: Expansion
//!
//! Resolves every requested member, splits the filter tree into top-level
//! conjuncts, and partitions the query into segments:
//!
//! - one segment per model that owns a requested (or filter-only) metric,
//!   in order of first appearance. A metric that reads another model through
//!   a join multiplying its owner's rows (one-to-many, many-to-many) is split
//!   into its own segment, so plain metrics of the owner are never
//!   aggregated over the fanned-out rows;
//! - a single dimension-only segment, anchored at the first dimension's
//!   model, when no metrics are involved.
//!
//! Each segment gets its own join tree and a placement for every
//! dimension-only filter. Conjuncts touching a metric are evaluated at the
//! root, after aggregation.

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use tracing::{debug, warn};

use super::filter::{FilterNode, LogicalOperator};
use super::member::{QueryMember, RootLayout};
use super::session::CompileSession;
use crate::model::DeclaredJoinKind;
use crate::semantic::error::{SemanticError, SemanticResult};
use crate::semantic::graph::{optimize, JoinTree};
use crate::semantic::query::Query;
use crate::semantic::repository::MemberKind;
use crate::sql::JoinKind;

/// Where a conjunct is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConjunctLevel {
    /// Only dimensions: evaluated inside each segment.
    Dimension,
    /// Touches a metric: evaluated on the root statement.
    Root,
}

/// One top-level conjunct of the request filter.
#[derive(Debug)]
pub struct Conjunct<'r> {
    pub node: FilterNode,
    pub members: Vec<Rc<QueryMember<'r>>>,
    pub level: ConjunctLevel,
}

/// Where a dimension conjunct lands inside a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Pushed into the statement of this model.
    Model(String),
    /// Evaluated on the segment statement.
    Segment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedFilter {
    /// Index into [`Expansion::conjuncts`].
    pub conjunct: usize,
    pub placement: Placement,
}

/// A join inside a segment, oriented away from the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentJoin {
    pub parent: String,
    pub child: String,
    /// Index into the repository's join list.
    pub join: usize,
    pub kind: JoinKind,
}

/// One aggregation unit of the query.
#[derive(Debug)]
pub struct Segment<'r> {
    pub alias: String,
    pub anchor: String,
    /// Requested and filter-only metrics computed here.
    pub metrics: Vec<Rc<QueryMember<'r>>>,
    /// Models read by members and filters, anchor first.
    pub required: Vec<String>,
    pub tree: JoinTree,
    /// Joins in breadth-first order from the anchor.
    pub joins: Vec<SegmentJoin>,
    pub filters: Vec<PlacedFilter>,
}

/// The expanded request.
#[derive(Debug)]
pub struct Expansion<'r> {
    pub dimensions: Vec<Rc<QueryMember<'r>>>,
    pub metrics: Vec<Rc<QueryMember<'r>>>,
    /// Metrics referenced only by root filters.
    pub hidden_metrics: Vec<Rc<QueryMember<'r>>>,
    pub conjuncts: Vec<Conjunct<'r>>,
    pub segments: Vec<Segment<'r>>,
}

impl<'r> Expansion<'r> {
    /// Segment aliases and which segment projects each metric.
    pub fn root_layout(&self) -> RootLayout {
        let mut layout = RootLayout::new(self.segments.iter().map(|s| s.alias.clone()).collect());
        for segment in &self.segments {
            for metric in &segment.metrics {
                layout.place_metric(metric.alias(), &segment.alias);
            }
        }
        layout
    }

    /// Every model touched by any segment, in first-use order.
    pub fn models(&self) -> Vec<String> {
        let mut out: Vec<String> = vec![];
        for segment in &self.segments {
            for model in &segment.tree.models {
                if !out.contains(model) {
                    out.push(model.clone());
                }
            }
        }
        out
    }

    /// Models present only to connect other models.
    pub fn join_models(&self) -> Vec<String> {
        self.models()
            .into_iter()
            .filter(|model| !self.segments.iter().any(|s| s.required.contains(model)))
            .collect()
    }

    /// Requested member with this path, if any.
    pub fn requested(&self, path: &str) -> Option<&Rc<QueryMember<'r>>> {
        self.dimensions
            .iter()
            .chain(self.metrics.iter())
            .find(|m| m.path() == path)
    }
}

/// Expand a request.
pub fn expand<'r>(session: &CompileSession<'r>, query: &Query) -> SemanticResult<Expansion<'r>> {
    if let Some(filters) = &query.filters {
        validate_top_level(filters)?;
    }

    let dimensions = resolve_members(session, &query.dimensions, MemberKind::Dimension)?;
    let metrics = resolve_members(session, &query.metrics, MemberKind::Metric)?;
    if dimensions.is_empty() && metrics.is_empty() {
        return Err(SemanticError::InvalidQuery(
            "query requests no dimensions or metrics".into(),
        ));
    }

    let mut hidden_metrics: Vec<Rc<QueryMember<'r>>> = vec![];
    let mut conjuncts = vec![];
    for node in query.filters.iter().flat_map(|f| f.conjuncts()) {
        let members = node
            .members()
            .into_iter()
            .map(|path| session.member(path))
            .collect::<SemanticResult<Vec<_>>>()?;

        let level = if members.iter().any(|m| m.is_metric()) {
            ConjunctLevel::Root
        } else {
            ConjunctLevel::Dimension
        };

        if level == ConjunctLevel::Root {
            for member in &members {
                if member.is_metric() {
                    let known = metrics
                        .iter()
                        .chain(hidden_metrics.iter())
                        .any(|m| m.path() == member.path());
                    if !known {
                        hidden_metrics.push(Rc::clone(member));
                    }
                } else if !dimensions.iter().any(|d| d.path() == member.path()) {
                    return Err(SemanticError::InvalidQuery(format!(
                        "filter combining metrics with dimension '{}' requires that dimension to be requested",
                        member.path()
                    )));
                }
            }
        }

        conjuncts.push(Conjunct {
            node,
            members,
            level,
        });
    }

    // Segment anchors, keyed by owner and the models reached across fan-out.
    let mut anchors: Vec<SegmentKey<'r>> = vec![];
    for metric in metrics.iter().chain(hidden_metrics.iter()) {
        let owner = metric.model_name();
        let fanned = fanned_out_models(session, metric)?;
        match anchors
            .iter_mut()
            .find(|key| key.anchor == owner && key.fanned == fanned)
        {
            Some(key) => key.metrics.push(Rc::clone(metric)),
            None => anchors.push(SegmentKey {
                anchor: owner.to_string(),
                fanned,
                metrics: vec![Rc::clone(metric)],
            }),
        }
    }
    if anchors.is_empty() {
        if let Some(first) = dimensions.first() {
            anchors.push(SegmentKey {
                anchor: first.model_name().to_string(),
                fanned: vec![],
                metrics: vec![],
            });
        }
    }

    let mut segments = Vec::with_capacity(anchors.len());
    for (i, key) in anchors.into_iter().enumerate() {
        let SegmentKey {
            anchor,
            metrics: segment_metrics,
            ..
        } = key;
        let segment = build_segment(
            session,
            format!("s{}", i),
            anchor,
            segment_metrics,
            &dimensions,
            &conjuncts,
        )?;
        segments.push(segment);
    }

    debug!(
        dimensions = dimensions.len(),
        metrics = metrics.len(),
        hidden_metrics = hidden_metrics.len(),
        segments = segments.len(),
        "query expanded"
    );

    Ok(Expansion {
        dimensions,
        metrics,
        hidden_metrics,
        conjuncts,
        segments,
    })
}

/// Metrics grouped into one segment.
struct SegmentKey<'r> {
    anchor: String,
    /// Models the metrics read through a join that multiplies anchor rows.
    fanned: Vec<String>,
    metrics: Vec<Rc<QueryMember<'r>>>,
}

/// Models `metric` reads whose path from the owning model fans out rows,
/// sorted.
fn fanned_out_models<'r>(
    session: &CompileSession<'r>,
    metric: &QueryMember<'r>,
) -> SemanticResult<Vec<String>> {
    let owner = metric.model_name();
    let mut out = vec![];
    for model in metric.referenced_models(session)? {
        if model != owner && fans_out(session, owner, &model)? {
            out.push(model);
        }
    }
    out.sort();
    Ok(out)
}

/// Whether the optimized path from `from` to `to` crosses a join that
/// multiplies `from` rows.
fn fans_out(session: &CompileSession<'_>, from: &str, to: &str) -> SemanticResult<bool> {
    let repository = session.repository();
    let tree = optimize(repository.graph(), &[from.to_string(), to.to_string()])?;

    let mut seen: HashSet<String> = HashSet::from([from.to_string()]);
    let mut queue = VecDeque::from([from.to_string()]);
    while let Some(parent) = queue.pop_front() {
        for (child, edge) in tree.neighbors(&parent) {
            if !seen.insert(child.to_string()) {
                continue;
            }
            let join = repository.join(edge.join).ok_or_else(|| {
                SemanticError::JoinPathReconstruction {
                    from: parent.clone(),
                    to: child.to_string(),
                }
            })?;
            if join.cardinality_from(&parent).causes_fanout() {
                return Ok(true);
            }
            queue.push_back(child.to_string());
        }
    }
    Ok(false)
}

/// An empty top-level `and` means "no filter"; empty groups below it are
/// rejected.
fn validate_top_level(node: &FilterNode) -> SemanticResult<()> {
    match node {
        FilterNode::Group(group) if group.operator == LogicalOperator::And => {
            group.filters.iter().try_for_each(|f| f.validate())
        }
        other => other.validate(),
    }
}

fn resolve_members<'r>(
    session: &CompileSession<'r>,
    paths: &[String],
    kind: MemberKind,
) -> SemanticResult<Vec<Rc<QueryMember<'r>>>> {
    let mut out: Vec<Rc<QueryMember<'r>>> = vec![];
    for path in paths {
        let member = session.member(path)?;
        if member.member().kind() != kind {
            let reason = match kind {
                MemberKind::Dimension => "not a dimension",
                MemberKind::Metric => "not a metric",
            };
            return Err(SemanticError::member_not_found(path, reason));
        }
        if !out.iter().any(|m| m.path() == member.path()) {
            out.push(member);
        }
    }
    Ok(out)
}

fn build_segment<'r>(
    session: &CompileSession<'r>,
    alias: String,
    anchor: String,
    metrics: Vec<Rc<QueryMember<'r>>>,
    dimensions: &[Rc<QueryMember<'r>>],
    conjuncts: &[Conjunct<'r>],
) -> SemanticResult<Segment<'r>> {
    let mut required = vec![anchor.clone()];
    let mut require = |models: Vec<String>| {
        for model in models {
            if !required.contains(&model) {
                required.push(model);
            }
        }
    };
    for member in metrics.iter().chain(dimensions.iter()) {
        require(member.referenced_models(session)?);
    }
    for conjunct in conjuncts {
        if conjunct.level == ConjunctLevel::Dimension {
            for member in &conjunct.members {
                require(member.referenced_models(session)?);
            }
        }
    }

    let repository = session.repository();
    let tree = optimize(repository.graph(), &required)?;

    // Orient the tree away from the anchor.
    let mut joins = vec![];
    let mut inner_reachable: HashSet<String> = HashSet::from([anchor.clone()]);
    let mut seen: HashSet<String> = HashSet::from([anchor.clone()]);
    let mut queue = VecDeque::from([anchor.clone()]);
    while let Some(parent) = queue.pop_front() {
        let parent = parent.as_str();
        for (child, edge) in tree.neighbors(parent) {
            if !seen.insert(child.to_string()) {
                continue;
            }
            queue.push_back(child.to_string());

            let join = repository.join(edge.join).ok_or_else(|| {
                SemanticError::JoinPathReconstruction {
                    from: parent.to_string(),
                    to: child.to_string(),
                }
            })?;

            let kind = match join.kind {
                Some(DeclaredJoinKind::Inner) => JoinKind::Inner,
                Some(DeclaredJoinKind::Full) => JoinKind::Full,
                None => JoinKind::Left,
            };
            if kind == JoinKind::Inner && inner_reachable.contains(parent) {
                inner_reachable.insert(child.to_string());
            }

            let cardinality = join.cardinality_from(parent);
            if cardinality.causes_fanout() && !metrics.is_empty() {
                warn!(
                    segment = %alias,
                    from = parent,
                    to = child,
                    %cardinality,
                    "join fans out rows; aggregates over the parent side may be inflated"
                );
            }

            joins.push(SegmentJoin {
                parent: parent.to_string(),
                child: child.to_string(),
                join: edge.join,
                kind,
            });
        }
    }

    let mut filters = vec![];
    for (i, conjunct) in conjuncts.iter().enumerate() {
        if conjunct.level != ConjunctLevel::Dimension {
            continue;
        }
        let mut models: Vec<String> = vec![];
        for member in &conjunct.members {
            for model in member.referenced_models(session)? {
                if !models.contains(&model) {
                    models.push(model);
                }
            }
        }
        let placement = match models.as_slice() {
            [only] if inner_reachable.contains(only) => Placement::Model(only.clone()),
            _ => Placement::Segment,
        };
        filters.push(PlacedFilter {
            conjunct: i,
            placement,
        });
    }

    debug!(
        segment = %alias,
        anchor = %anchor,
        models = ?tree.models,
        "segment planned"
    );

    Ok(Segment {
        alias,
        anchor,
        metrics,
        required,
        tree,
        joins,
        filters,
    })
}
