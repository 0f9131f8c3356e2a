//! The repository: every declared model and join, finalized once.
//!
//! Construction validates the schema eagerly (unique names, exactly one
//! primary key per model, joins between known models, at most one join per
//! model pair) and builds the weighted join graph. After that the repository
//! is immutable and can be shared across threads for concurrent compiles.

use std::collections::HashMap;

use super::error::{SemanticError, SemanticResult};
use super::graph::JoinGraph;
use crate::model::{
    AdHocAggregate, Dimension, DimensionType, Format, Granularity, Join, Metric, Model,
};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// A resolved member of the repository.
#[derive(Debug, Clone, Copy)]
pub enum Member<'r> {
    Dimension {
        model: &'r Model,
        dimension: &'r Dimension,
    },
    /// A temporal dimension viewed at a granularity.
    Granularity {
        model: &'r Model,
        dimension: &'r Dimension,
        granularity: Granularity,
    },
    Metric {
        model: &'r Model,
        metric: &'r Metric,
    },
    /// A dimension aggregated without a declared metric.
    AdHoc {
        model: &'r Model,
        dimension: &'r Dimension,
        aggregate: AdHocAggregate,
    },
}

/// Coarse member classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Dimension,
    Metric,
}

impl<'r> Member<'r> {
    pub fn model(&self) -> &'r Model {
        match self {
            Member::Dimension { model, .. }
            | Member::Granularity { model, .. }
            | Member::Metric { model, .. }
            | Member::AdHoc { model, .. } => model,
        }
    }

    /// `model.member[.suffix]`
    pub fn path(&self) -> String {
        match self {
            Member::Dimension { model, dimension } => format!("{}.{}", model.name, dimension.name),
            Member::Granularity {
                model,
                dimension,
                granularity,
            } => format!("{}.{}.{}", model.name, dimension.name, granularity),
            Member::Metric { model, metric } => format!("{}.{}", model.name, metric.name),
            Member::AdHoc {
                model,
                dimension,
                aggregate,
            } => format!("{}.{}.{}", model.name, dimension.name, aggregate),
        }
    }

    pub fn kind(&self) -> MemberKind {
        match self {
            Member::Dimension { .. } | Member::Granularity { .. } => MemberKind::Dimension,
            Member::Metric { .. } | Member::AdHoc { .. } => MemberKind::Metric,
        }
    }

    pub fn is_metric(&self) -> bool {
        self.kind() == MemberKind::Metric
    }

    /// Value type, where one is known.
    pub fn ty(&self) -> Option<DimensionType> {
        match self {
            Member::Dimension { dimension, .. } => Some(dimension.ty),
            Member::Granularity { granularity, .. } => Some(granularity.result_type()),
            Member::Metric { .. } => Some(DimensionType::Number),
            Member::AdHoc {
                dimension,
                aggregate,
                ..
            } => match aggregate {
                AdHocAggregate::Min | AdHocAggregate::Max => Some(dimension.ty),
                _ => Some(DimensionType::Number),
            },
        }
    }

    pub fn format(&self) -> Option<&'r Format> {
        match self {
            Member::Dimension { dimension, .. } | Member::Granularity { dimension, .. } => {
                dimension.format.as_ref()
            }
            Member::Metric { metric, .. } => metric.format.as_ref(),
            Member::AdHoc { .. } => None,
        }
    }
}

/// Alias of a member path: `.` replaced by `___`.
pub fn alias_for(path: &str) -> String {
    path.replace(PATH_SEPARATOR, "___")
}

/// Builder collecting models and joins before validation.
#[derive(Debug, Default)]
pub struct RepositoryBuilder {
    models: Vec<Model>,
    joins: Vec<Join>,
}

impl RepositoryBuilder {
    pub fn model(mut self, model: Model) -> Self {
        self.models.push(model);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn build(self) -> SemanticResult<Repository> {
        Repository::new(self.models, self.joins)
    }
}

/// All models and joins plus the join graph over them.
#[derive(Debug, Clone)]
pub struct Repository {
    models: Vec<Model>,
    model_index: HashMap<String, usize>,
    joins: Vec<Join>,
    graph: JoinGraph,
}

impl Repository {
    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::default()
    }

    /// Validate and finalize.
    pub fn new(models: Vec<Model>, joins: Vec<Join>) -> SemanticResult<Self> {
        let mut model_index = HashMap::with_capacity(models.len());
        for (i, model) in models.iter().enumerate() {
            validate_model(model)?;
            if model_index.insert(model.name.clone(), i).is_some() {
                return Err(SemanticError::InvalidModel(format!(
                    "model '{}' is declared more than once",
                    model.name
                )));
            }
        }

        let mut pairs: Vec<(&str, &str)> = vec![];
        for join in &joins {
            for side in [&join.from, &join.to] {
                if !model_index.contains_key(side) {
                    return Err(SemanticError::UnknownModel(side.clone()));
                }
            }
            if join.from == join.to {
                return Err(SemanticError::InvalidModel(format!(
                    "join from '{}' to itself",
                    join.from
                )));
            }
            let duplicate = pairs.iter().any(|&(a, b)| {
                (a == join.from && b == join.to) || (a == join.to && b == join.from)
            });
            if duplicate {
                return Err(SemanticError::DuplicateJoin {
                    from: join.from.clone(),
                    to: join.to.clone(),
                });
            }
            pairs.push((&join.from, &join.to));
        }

        let graph = JoinGraph::build(&models, &joins);
        tracing::debug!(
            models = models.len(),
            joins = joins.len(),
            "repository finalized"
        );

        Ok(Self {
            models,
            model_index,
            joins,
            graph,
        })
    }

    /// Models in declaration order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.model_index.get(name).map(|&i| &self.models[i])
    }

    pub fn require_model(&self, name: &str) -> SemanticResult<&Model> {
        self.model(name)
            .ok_or_else(|| SemanticError::UnknownModel(name.to_string()))
    }

    /// Joins in declaration order.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn join(&self, index: usize) -> Option<&Join> {
        self.joins.get(index)
    }

    pub fn graph(&self) -> &JoinGraph {
        &self.graph
    }

    /// Resolve `model.member`, `model.dimension.<granularity>` or
    /// `model.dimension.adhoc_<fn>`.
    pub fn get_member(&self, path: &str) -> SemanticResult<Member<'_>> {
        let parts: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        if parts.iter().any(|p| p.is_empty()) || !(2..=3).contains(&parts.len()) {
            return Err(SemanticError::member_not_found(
                path,
                "expected '<model>.<member>'",
            ));
        }

        let model = self.model(parts[0]).ok_or_else(|| {
            SemanticError::member_not_found(path, format!("unknown model '{}'", parts[0]))
        })?;

        if parts.len() == 2 {
            if let Some(dimension) = model.get_dimension(parts[1]) {
                return Ok(Member::Dimension { model, dimension });
            }
            if let Some(metric) = model.get_metric(parts[1]) {
                return Ok(Member::Metric { model, metric });
            }
            return Err(SemanticError::member_not_found(
                path,
                format!("model '{}' has no member '{}'", model.name, parts[1]),
            ));
        }

        let dimension = model.get_dimension(parts[1]).ok_or_else(|| {
            SemanticError::member_not_found(
                path,
                format!("model '{}' has no dimension '{}'", model.name, parts[1]),
            )
        })?;

        let suffix = parts[2];
        if suffix.starts_with(AdHocAggregate::PREFIX) {
            let aggregate = AdHocAggregate::from_suffix(suffix).ok_or_else(|| {
                SemanticError::member_not_found(path, format!("unknown ad-hoc aggregate '{}'", suffix))
            })?;
            return Ok(Member::AdHoc {
                model,
                dimension,
                aggregate,
            });
        }

        let granularity: Granularity = suffix.parse()?;
        if !granularity.applies_to(dimension.ty) {
            return Err(SemanticError::member_not_found(
                path,
                format!(
                    "granularity '{}' is not available on {} dimension '{}'",
                    granularity, dimension.ty, dimension.name
                ),
            ));
        }
        Ok(Member::Granularity {
            model,
            dimension,
            granularity,
        })
    }

    /// Resolve a dimension-kind member.
    pub fn get_dimension(&self, path: &str) -> SemanticResult<Member<'_>> {
        let member = self.get_member(path)?;
        match member.kind() {
            MemberKind::Dimension => Ok(member),
            MemberKind::Metric => Err(SemanticError::member_not_found(path, "not a dimension")),
        }
    }

    /// Resolve a metric-kind member.
    pub fn get_metric(&self, path: &str) -> SemanticResult<Member<'_>> {
        let member = self.get_member(path)?;
        match member.kind() {
            MemberKind::Metric => Ok(member),
            MemberKind::Dimension => Err(SemanticError::member_not_found(path, "not a metric")),
        }
    }

    /// Every declared dimension and metric path, plus granularity paths of
    /// temporal dimensions.
    pub fn member_paths(&self) -> Vec<String> {
        let mut paths = vec![];
        for model in &self.models {
            for dimension in &model.dimensions {
                paths.push(format!("{}.{}", model.name, dimension.name));
                for granularity in Granularity::ALL {
                    if granularity.applies_to(dimension.ty) {
                        paths.push(format!(
                            "{}.{}.{}",
                            model.name, dimension.name, granularity
                        ));
                    }
                }
            }
            for metric in &model.metrics {
                paths.push(format!("{}.{}", model.name, metric.name));
            }
        }
        paths
    }
}

fn validate_model(model: &Model) -> SemanticResult<()> {
    let invalid_name = |name: &str| name.is_empty() || name.contains(PATH_SEPARATOR);

    if invalid_name(&model.name) {
        return Err(SemanticError::InvalidModel(format!(
            "invalid model name '{}'",
            model.name
        )));
    }

    let mut seen: Vec<&str> = vec![];
    let names = model
        .dimensions
        .iter()
        .map(|d| d.name.as_str())
        .chain(model.metrics.iter().map(|m| m.name.as_str()));
    for name in names {
        if invalid_name(name) {
            return Err(SemanticError::InvalidModel(format!(
                "invalid member name '{}' on model '{}'",
                name, model.name
            )));
        }
        if seen.contains(&name) {
            return Err(SemanticError::InvalidModel(format!(
                "member '{}' is declared more than once on model '{}'",
                name, model.name
            )));
        }
        seen.push(name);
    }

    let primary_keys = model.dimensions.iter().filter(|d| d.primary_key).count();
    if primary_keys != 1 {
        return Err(SemanticError::InvalidModel(format!(
            "model '{}' must declare exactly one primary key dimension, found {}",
            model.name, primary_keys
        )));
    }

    Ok(())
}
