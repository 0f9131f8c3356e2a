//! Members as they appear in one compile.
//!
//! A [`QueryMember`] renders one repository member at each nesting level of
//! the generated SQL:
//!
//! - **model level**: the expression over the model's source columns
//!   (`"user"."first_name"`). Dimensions only.
//! - **segment level**: dimensions read their model-level projection
//!   (`"user"."user___first_name"`); metrics aggregate over the columns
//!   their model statements project (`COUNT(DISTINCT "user"."user___count___CustomerId")`).
//! - **root level**: the segment output (`"s0"."user___count"`), coalesced
//!   across segments for dimensions.
//!
//! Template evaluation happens once per member per compile; the result is
//! cached on the member.

use std::cell::OnceCell;
use std::collections::HashMap;

use super::session::CompileSession;
use crate::model::{Join, MemberSqlArgs, Model, SqlPart, SqlTemplate};
use crate::semantic::error::{SemanticError, SemanticResult};
use crate::semantic::repository::{alias_for, Member, PATH_SEPARATOR};
use crate::sql::{SelectItem, SqlFragment};

/// One column a model statement must project.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProjection {
    pub model: String,
    pub alias: String,
    pub sql: SqlFragment,
}

impl ModelProjection {
    pub fn select_item(&self) -> SelectItem {
        SelectItem::new(self.sql.clone()).with_alias(&self.alias)
    }
}

/// Add `items` to `into`, skipping projections already present.
pub fn merge_projections(
    into: &mut Vec<ModelProjection>,
    items: impl IntoIterator<Item = ModelProjection>,
) {
    for item in items {
        if !into
            .iter()
            .any(|p| p.model == item.model && p.alias == item.alias)
        {
            into.push(item);
        }
    }
}

fn merge_models(into: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

/// Where each segment's outputs live at the root level.
#[derive(Debug, Clone, Default)]
pub struct RootLayout {
    segments: Vec<String>,
    metrics: HashMap<String, String>,
}

impl RootLayout {
    pub fn new(segments: Vec<String>) -> Self {
        Self {
            segments,
            metrics: HashMap::new(),
        }
    }

    /// Record that `metric_alias` is projected by `segment`.
    pub fn place_metric(&mut self, metric_alias: &str, segment: &str) {
        self.metrics
            .insert(metric_alias.to_string(), segment.to_string());
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn segment_of(&self, metric_alias: &str) -> Option<&str> {
        self.metrics.get(metric_alias).map(String::as_str)
    }
}

/// Nesting level a member is rendered at.
#[derive(Debug, Clone, Copy)]
pub enum MemberLevel<'a> {
    Model,
    Segment,
    Root(&'a RootLayout),
}

/// Evaluated template of a member.
#[derive(Debug, Clone)]
struct Compiled {
    /// Model-level SQL for dimensions, segment-level SQL for metrics.
    sql: SqlFragment,
    projections: Vec<ModelProjection>,
    models: Vec<String>,
}

/// A repository member bound to one compile.
#[derive(Debug)]
pub struct QueryMember<'r> {
    member: Member<'r>,
    path: String,
    alias: String,
    compiled: OnceCell<Compiled>,
}

impl<'r> QueryMember<'r> {
    pub fn new(member: Member<'r>) -> Self {
        let path = member.path();
        let alias = alias_for(&path);
        Self {
            member,
            path,
            alias,
            compiled: OnceCell::new(),
        }
    }

    pub fn member(&self) -> Member<'r> {
        self.member
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn model_name(&self) -> &'r str {
        &self.member.model().name
    }

    pub fn is_metric(&self) -> bool {
        self.member.is_metric()
    }

    fn compiled(&self, session: &CompileSession<'r>) -> SemanticResult<&Compiled> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }
        let compiled = {
            let _guard = session.enter(&self.path)?;
            self.compile(session)?
        };
        Ok(self.compiled.get_or_init(|| compiled))
    }

    fn compile(&self, session: &CompileSession<'r>) -> SemanticResult<Compiled> {
        let args = |model: &'r Model| MemberSqlArgs {
            model: &model.name,
            context: session.context(),
        };

        match self.member {
            Member::Dimension { model, dimension } => {
                let template = dimension.template(&args(model));
                let sql = self.render_model_level(session, model, template)?;
                Ok(self.own_projection(model, sql))
            }
            Member::Granularity {
                model,
                dimension,
                granularity,
            } => {
                let parent = session.member(&format!("{}.{}", model.name, dimension.name))?;
                let base = parent.sql(session)?;
                let sql = session.dialect().dialect().granularity(granularity, &base);
                Ok(self.own_projection(model, sql))
            }
            Member::Metric { model, metric } => {
                let template = metric.template(&args(model));
                self.render_segment_level(session, model, template)
            }
            Member::AdHoc {
                model,
                dimension,
                aggregate,
            } => {
                let target = session.member(&format!("{}.{}", model.name, dimension.name))?;
                let inner = target.segment_sql(session)?;
                Ok(Compiled {
                    sql: SqlFragment::with_bindings(aggregate.apply(&inner.sql), inner.bindings),
                    projections: target.model_query_projections(session)?,
                    models: target.referenced_models(session)?,
                })
            }
        }
    }

    fn own_projection(&self, model: &Model, sql: SqlFragment) -> Compiled {
        Compiled {
            projections: vec![ModelProjection {
                model: model.name.clone(),
                alias: self.alias.clone(),
                sql: sql.clone(),
            }],
            models: vec![model.name.clone()],
            sql,
        }
    }

    /// Dimension templates: columns of the owning model and other dimensions
    /// of the same model.
    fn render_model_level(
        &self,
        session: &CompileSession<'r>,
        model: &Model,
        template: SqlTemplate,
    ) -> SemanticResult<SqlFragment> {
        let mut out = SqlFragment::default();
        for part in template.parts {
            match part {
                SqlPart::Column(column) => {
                    out.append(&session.qualified(&model.name, &column));
                }
                SqlPart::Dimension(reference) => {
                    let path = qualify(session, &reference, &model.name);
                    let dep = session.member(&path)?;
                    if dep.is_metric() {
                        return Err(SemanticError::InvalidReference(format!(
                            "'{}' references metric '{}' where a dimension is expected",
                            self.path, path
                        )));
                    }
                    if dep.model_name() != model.name {
                        return Err(SemanticError::InvalidReference(format!(
                            "dimension '{}' references '{}' on another model",
                            self.path, path
                        )));
                    }
                    out.append(&dep.sql(session)?);
                }
                SqlPart::Metric(reference) => {
                    return Err(SemanticError::InvalidReference(format!(
                        "dimension '{}' cannot reference metric '{}'",
                        self.path, reference
                    )));
                }
                other => push_literal(session, &mut out, other),
            }
        }
        Ok(out)
    }

    /// Metric templates: columns are projected by the model statement under
    /// `<metric alias>___<column>` and read back from there.
    fn render_segment_level(
        &self,
        session: &CompileSession<'r>,
        model: &Model,
        template: SqlTemplate,
    ) -> SemanticResult<Compiled> {
        let mut sql = SqlFragment::default();
        let mut projections = vec![];
        let mut models = vec![model.name.clone()];

        for part in template.parts {
            match part {
                SqlPart::Column(column) => {
                    let alias = format!("{}___{}", self.alias, column);
                    sql.append(&session.qualified(&model.name, &alias));
                    merge_projections(
                        &mut projections,
                        [ModelProjection {
                            model: model.name.clone(),
                            alias,
                            sql: session.qualified(&model.name, &column),
                        }],
                    );
                }
                SqlPart::Dimension(reference) => {
                    let path = qualify(session, &reference, &model.name);
                    let dep = session.member(&path)?;
                    if dep.is_metric() {
                        return Err(SemanticError::InvalidReference(format!(
                            "'{}' references metric '{}' where a dimension is expected",
                            self.path, path
                        )));
                    }
                    sql.append(&dep.segment_sql(session)?);
                    merge_projections(&mut projections, dep.model_query_projections(session)?);
                    merge_models(&mut models, &dep.referenced_models(session)?);
                }
                SqlPart::Metric(reference) => {
                    let path = qualify(session, &reference, &model.name);
                    let dep = session.member(&path)?;
                    if !dep.is_metric() {
                        return Err(SemanticError::InvalidReference(format!(
                            "'{}' references dimension '{}' where a metric is expected",
                            self.path, path
                        )));
                    }
                    sql.append(&dep.sql(session)?.parenthesize());
                    merge_projections(&mut projections, dep.model_query_projections(session)?);
                    merge_models(&mut models, &dep.referenced_models(session)?);
                }
                other => push_literal(session, &mut sql, other),
            }
        }

        Ok(Compiled {
            sql,
            projections,
            models,
        })
    }

    /// Model-level SQL for dimensions, segment-level aggregate for metrics.
    pub fn sql(&self, session: &CompileSession<'r>) -> SemanticResult<SqlFragment> {
        Ok(self.compiled(session)?.sql.clone())
    }

    /// Projections this member needs from model statements.
    pub fn model_query_projections(
        &self,
        session: &CompileSession<'r>,
    ) -> SemanticResult<Vec<ModelProjection>> {
        Ok(self.compiled(session)?.projections.clone())
    }

    /// Models whose statements this member reads, owner first.
    pub fn referenced_models(&self, session: &CompileSession<'r>) -> SemanticResult<Vec<String>> {
        Ok(self.compiled(session)?.models.clone())
    }

    /// The member inside a segment statement.
    pub fn segment_sql(&self, session: &CompileSession<'r>) -> SemanticResult<SqlFragment> {
        if self.is_metric() {
            self.sql(session)
        } else {
            Ok(session.qualified(self.model_name(), &self.alias))
        }
    }

    pub fn segment_projection(&self, session: &CompileSession<'r>) -> SemanticResult<SelectItem> {
        Ok(SelectItem::new(self.segment_sql(session)?).with_alias(&self.alias))
    }

    /// Group-by expression inside a segment; metrics have none.
    pub fn segment_group_by(
        &self,
        session: &CompileSession<'r>,
    ) -> SemanticResult<Option<SqlFragment>> {
        if self.is_metric() {
            Ok(None)
        } else {
            self.segment_sql(session).map(Some)
        }
    }

    /// The member in the root statement.
    pub fn root_sql(
        &self,
        session: &CompileSession<'r>,
        layout: &RootLayout,
    ) -> SemanticResult<SqlFragment> {
        if self.is_metric() {
            let segment = layout.segment_of(&self.alias).ok_or_else(|| {
                SemanticError::InvalidQuery(format!(
                    "metric '{}' is not computed by any segment",
                    self.path
                ))
            })?;
            return Ok(session.qualified(segment, &self.alias));
        }

        let refs: Vec<SqlFragment> = layout
            .segments()
            .iter()
            .map(|segment| session.qualified(segment, &self.alias))
            .collect();
        Ok(coalesce(refs))
    }

    /// The member inside a filter predicate at `level`. Metrics are only
    /// addressable after aggregation.
    pub fn filter_sql(
        &self,
        session: &CompileSession<'r>,
        level: MemberLevel<'_>,
    ) -> SemanticResult<SqlFragment> {
        match level {
            MemberLevel::Model if self.is_metric() => Err(SemanticError::InvalidQuery(format!(
                "metric '{}' cannot be filtered before aggregation",
                self.path
            ))),
            MemberLevel::Model => self.sql(session),
            MemberLevel::Segment => self.segment_sql(session),
            MemberLevel::Root(layout) => self.root_sql(session, layout),
        }
    }

    pub fn root_projection(
        &self,
        session: &CompileSession<'r>,
        layout: &RootLayout,
    ) -> SemanticResult<SelectItem> {
        Ok(SelectItem::new(self.root_sql(session, layout)?).with_alias(&self.alias))
    }
}

/// `coalesce(a, b, ...)`, or the single expression.
pub fn coalesce(mut refs: Vec<SqlFragment>) -> SqlFragment {
    if refs.len() == 1 {
        return refs.remove(0);
    }
    SqlFragment::join(&refs, ", ").wrap("coalesce(", ")")
}

/// Render a join condition at segment level.
///
/// Conditions may only reference dimensions of the two joined models; each
/// referenced dimension is projected by its model statement.
pub fn render_join_condition<'r>(
    session: &CompileSession<'r>,
    join: &Join,
) -> SemanticResult<(SqlFragment, Vec<ModelProjection>)> {
    let mut sql = SqlFragment::default();
    let mut projections = vec![];

    for part in join.template(session.context()).parts {
        match part {
            SqlPart::Dimension(path) => {
                let dep = session.member(&path)?;
                if dep.is_metric() {
                    return Err(SemanticError::InvalidReference(format!(
                        "join {} -> {} references metric '{}'",
                        join.from, join.to, path
                    )));
                }
                if dep.model_name() != join.from && dep.model_name() != join.to {
                    return Err(SemanticError::InvalidReference(format!(
                        "join {} -> {} references '{}' outside the joined models",
                        join.from, join.to, path
                    )));
                }
                sql.append(&dep.segment_sql(session)?);
                merge_projections(&mut projections, dep.model_query_projections(session)?);
            }
            SqlPart::Column(column) => {
                return Err(SemanticError::InvalidReference(format!(
                    "join {} -> {} references column '{}'; reference a dimension instead",
                    join.from, join.to, column
                )));
            }
            SqlPart::Metric(path) => {
                return Err(SemanticError::InvalidReference(format!(
                    "join {} -> {} references metric '{}'",
                    join.from, join.to, path
                )));
            }
            other => push_literal(session, &mut sql, other),
        }
    }

    Ok((sql, projections))
}

/// Emit parts that render the same at every level.
fn push_literal(session: &CompileSession<'_>, out: &mut SqlFragment, part: SqlPart) {
    match part {
        SqlPart::Sql(sql) => {
            out.push_sql(&sql);
        }
        SqlPart::Value(value) => {
            out.append(&SqlFragment::binding(value));
        }
        SqlPart::Identifier(name) => {
            out.push_sql(&session.quote(&name));
        }
        SqlPart::Column(_) | SqlPart::Dimension(_) | SqlPart::Metric(_) => {}
    }
}

/// Qualify a local reference with the owning model. A reference is already
/// qualified only when its first segment names a model; `created.month` on
/// `user` is `user.created.month`.
fn qualify(session: &CompileSession<'_>, reference: &str, model: &str) -> String {
    let first = reference.split(PATH_SEPARATOR).next().unwrap_or(reference);
    if reference.contains(PATH_SEPARATOR) && session.repository().model(first).is_some() {
        reference.to_string()
    } else {
        format!("{}{}{}", model, PATH_SEPARATOR, reference)
    }
}
