//! Declarative schema loader.
//!
//! Reads models and joins from a TOML file and builds a [`Repository`].
//! SQL strings use a small template syntax:
//!
//! | Placeholder              | Meaning                                    |
//! |--------------------------|--------------------------------------------|
//! | `{column:Name}`          | column of the owning model                 |
//! | `{dimension:name}`       | dimension, local or `model.name`           |
//! | `{metric:name}`          | metric, local or `model.name`              |
//! | `{identifier:name}`      | quoted identifier                          |
//! | `{context:/json/ptr}`    | bound value read from the compile context  |
//! | `{from:name}` `{to:name}`| join conditions: dimension of either side  |
//!
//! # Example
//!
//! ```toml
//! [[models]]
//! name = "user"
//! table = "Table"
//!
//! [[models.dimensions]]
//! name = "user_id"
//! type = "number"
//! primary_key = true
//!
//! [[models.metrics]]
//! name = "count"
//! sql = "COUNT(DISTINCT {column:CustomerId})"
//!
//! [[joins]]
//! from = "orders"
//! to = "user"
//! cardinality = "manyToOne"
//! condition = "{from:user_id} = {to:user_id}"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::{
    Cardinality, DeclaredJoinKind, Dimension, DimensionType, Format, Join, JoinSqlArgs, Metric,
    Model, Priority, SqlTemplate,
};
use crate::semantic::{Repository, SemanticError};

/// Errors that can occur when loading a schema.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse schema: {0}")]
    Parse(#[from] toml::de::Error),

    /// Invalid model, member or join definition
    #[error("Invalid {kind} '{name}': {message}")]
    InvalidDefinition {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("Invalid template '{template}': {message}")]
    Template { template: String, message: String },

    /// The schema parsed but the repository rejected it
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

/// Result type for schema loading.
pub type LoaderResult<T> = Result<T, LoaderError>;

// ============================================================================
// File Format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    #[serde(default)]
    models: Vec<ModelDef>,
    #[serde(default)]
    joins: Vec<JoinDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelDef {
    name: String,
    table: Option<String>,
    subquery: Option<String>,
    #[serde(default)]
    dimensions: Vec<DimensionDef>,
    #[serde(default)]
    metrics: Vec<MetricDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DimensionDef {
    name: String,
    #[serde(rename = "type", default)]
    ty: DimensionType,
    #[serde(default)]
    primary_key: bool,
    format: Option<String>,
    sql: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricDef {
    name: String,
    sql: String,
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JoinDef {
    from: String,
    to: String,
    cardinality: Cardinality,
    #[serde(default)]
    priority: Priority,
    kind: Option<DeclaredJoinKind>,
    condition: String,
}

// ============================================================================
// Templates
// ============================================================================

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+):([^{}]+)\}").unwrap());

/// Where a template is used; decides which placeholders are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Member,
    Join,
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Sql(String),
    Column(String),
    Dimension(String),
    Metric(String),
    Identifier(String),
    Context(String),
    From(String),
    To(String),
}

/// A parsed SQL template string, rendered per compile.
#[derive(Debug, Clone, PartialEq)]
struct TemplateSource {
    pieces: Vec<Piece>,
}

impl TemplateSource {
    fn parse(source: &str, scope: Scope) -> LoaderResult<Self> {
        let error = |message: String| LoaderError::Template {
            template: source.to_string(),
            message,
        };

        let mut pieces = vec![];
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(source) {
            let (Some(whole), Some(kind), Some(arg)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if whole.start() > last {
                pieces.push(Piece::Sql(source[last..whole.start()].to_string()));
            }
            last = whole.end();

            let arg = arg.as_str().trim().to_string();
            let piece = match (kind.as_str(), scope) {
                ("dimension", _) => Piece::Dimension(arg),
                ("identifier", _) => Piece::Identifier(arg),
                ("context", _) => {
                    if !arg.is_empty() && !arg.starts_with('/') {
                        return Err(error(format!(
                            "context pointer '{}' must start with '/'",
                            arg
                        )));
                    }
                    Piece::Context(arg)
                }
                ("column", Scope::Member) => Piece::Column(arg),
                ("metric", Scope::Member) => Piece::Metric(arg),
                ("from", Scope::Join) => Piece::From(arg),
                ("to", Scope::Join) => Piece::To(arg),
                ("column" | "metric", Scope::Join) => {
                    return Err(error(format!(
                        "'{}' is not allowed in a join condition",
                        kind.as_str()
                    )))
                }
                ("from" | "to", Scope::Member) => {
                    return Err(error(format!(
                        "'{}' is only allowed in a join condition",
                        kind.as_str()
                    )))
                }
                (other, _) => return Err(error(format!("unknown placeholder '{}'", other))),
            };
            pieces.push(piece);
        }
        if last < source.len() {
            pieces.push(Piece::Sql(source[last..].to_string()));
        }

        Ok(Self { pieces })
    }

    fn render(&self, context: &Value, join: Option<&JoinSqlArgs<'_>>) -> SqlTemplate {
        self.pieces
            .iter()
            .fold(SqlTemplate::new(), |template, piece| match piece {
                Piece::Sql(sql) => template.sql(sql),
                Piece::Column(name) => template.column(name),
                Piece::Dimension(path) => template.dimension(path),
                Piece::Metric(path) => template.metric(path),
                Piece::Identifier(name) => template.identifier(name),
                // Missing context binds null.
                Piece::Context(pointer) => {
                    template.value(context.pointer(pointer).cloned().unwrap_or(Value::Null))
                }
                Piece::From(name) => match join {
                    Some(args) => template.part(args.from_dimension(name)),
                    None => template,
                },
                Piece::To(name) => match join {
                    Some(args) => template.part(args.to_dimension(name)),
                    None => template,
                },
            })
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load a schema file and build its repository.
pub fn load_schema(path: impl AsRef<Path>) -> LoaderResult<Repository> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.to_path_buf()));
    }
    let source = fs::read_to_string(path)?;
    parse_schema(&source)
}

/// Parse schema TOML and build its repository.
pub fn parse_schema(source: &str) -> LoaderResult<Repository> {
    let file: SchemaFile = toml::from_str(source)?;

    let mut builder = Repository::builder();
    for def in file.models {
        builder = builder.model(build_model(def)?);
    }
    for def in file.joins {
        builder = builder.join(build_join(def)?);
    }
    Ok(builder.build()?)
}

fn build_model(def: ModelDef) -> LoaderResult<Model> {
    let mut model = Model::new(&def.name);
    match (&def.table, &def.subquery) {
        (Some(_), Some(_)) => {
            return Err(LoaderError::InvalidDefinition {
                kind: "model",
                name: def.name,
                message: "declare either 'table' or 'subquery', not both".into(),
            })
        }
        (Some(table), None) => model = model.table(table),
        (None, Some(sql)) => model = model.subquery(sql),
        (None, None) => {}
    }

    for dim in def.dimensions {
        let mut dimension = Dimension::new(&dim.name, dim.ty);
        if dim.primary_key {
            dimension = dimension.primary_key();
        }
        if let Some(name) = &dim.format {
            dimension = dimension.with_format(parse_format("dimension", &dim.name, name)?);
        }
        if let Some(sql) = &dim.sql {
            let template = TemplateSource::parse(sql, Scope::Member)?;
            dimension = dimension.with_sql(move |args| template.render(args.context, None));
        }
        model = model.dimension(dimension);
    }

    for def in def.metrics {
        let template = TemplateSource::parse(&def.sql, Scope::Member)?;
        let mut metric = Metric::new(&def.name, move |args| template.render(args.context, None));
        if let Some(name) = &def.format {
            metric = metric.with_format(parse_format("metric", &def.name, name)?);
        }
        model = model.metric(metric);
    }

    Ok(model)
}

fn build_join(def: JoinDef) -> LoaderResult<Join> {
    let template = TemplateSource::parse(&def.condition, Scope::Join)?;
    let mut join = Join::new(&def.from, &def.to, def.cardinality, move |args| {
        template.render(args.context, Some(args))
    })
    .with_priority(def.priority);
    if let Some(kind) = def.kind {
        join = join.with_kind(kind);
    }
    Ok(join)
}

fn parse_format(kind: &'static str, member: &str, name: &str) -> LoaderResult<Format> {
    Format::from_name(name).ok_or_else(|| LoaderError::InvalidDefinition {
        kind,
        name: member.to_string(),
        message: format!(
            "unknown format '{}' (expected percentage or currency)",
            name
        ),
    })
}
