//! Tests for the TOML schema loader.

use semlayer::compile::{compile, CompileOptions};
use semlayer::model::loader::{load_schema, parse_schema, LoaderError};
use semlayer::model::{Cardinality, DeclaredJoinKind, DimensionType, Priority};
use semlayer::semantic::{Member, Query, SemanticError};
use semlayer::sql::Dialect;
use serde_json::json;

const SCHEMA: &str = r#"
[[models]]
name = "user"
table = "Table"

[[models.dimensions]]
name = "user_id"
type = "number"
primary_key = true

[[models.dimensions]]
name = "first_name"

[[models.dimensions]]
name = "last_name"

[[models.dimensions]]
name = "full_name"
sql = "{dimension:first_name} || ' ' || {dimension:last_name}"

[[models.dimensions]]
name = "created"
type = "datetime"

[[models.dimensions]]
name = "balance"
type = "number"
format = "currency"

[[models.metrics]]
name = "count"
sql = "COUNT(DISTINCT {column:CustomerId})"

[[models.metrics]]
name = "visible_count"
sql = "count(case when {column:tenant_id} = {context:/tenant/id} then 1 end)"

[[models]]
name = "orders"
subquery = "select * from raw_orders"

[[models.dimensions]]
name = "id"
type = "number"
primary_key = true

[[models.dimensions]]
name = "user_id"
type = "number"

[[models.metrics]]
name = "total"
sql = "sum({column:amount})"
format = "currency"

[[joins]]
from = "orders"
to = "user"
cardinality = "manyToOne"
priority = "high"
kind = "inner"
condition = "{from:user_id} = {to:user_id}"
"#;

#[test]
fn test_loads_models_and_joins() {
    let repo = parse_schema(SCHEMA).unwrap();

    assert_eq!(repo.models().len(), 2);
    assert_eq!(repo.joins().len(), 1);

    let join = &repo.joins()[0];
    assert_eq!(join.cardinality, Cardinality::ManyToOne);
    assert_eq!(join.priority, Priority::High);
    assert_eq!(join.kind, Some(DeclaredJoinKind::Inner));

    let user = repo.model("user").unwrap();
    assert_eq!(user.primary_key().unwrap().name, "user_id");
    assert_eq!(user.get_dimension("first_name").unwrap().ty, DimensionType::String);

    match repo.get_member("user.balance").unwrap() {
        Member::Dimension { dimension, .. } => {
            assert_eq!(dimension.format.as_ref().map(|f| f.name()), Some("currency"));
        }
        other => panic!("unexpected member: {:?}", other),
    }
}

#[test]
fn test_loaded_schema_compiles() {
    let repo = parse_schema(SCHEMA).unwrap();
    let query = Query::new()
        .dimension("user.full_name")
        .metric("orders.total");
    let compiled = compile(
        &repo,
        &query,
        &CompileOptions::default().with_dialect(Dialect::Ansi),
    )
    .unwrap();

    assert!(compiled.sql.contains(
        "\"user\".\"first_name\" || ' ' || \"user\".\"last_name\" as \"user___full_name\""
    ));
    assert!(compiled.sql.contains("from (select * from raw_orders) as \"orders\""));
    assert!(compiled
        .sql
        .contains("on \"orders\".\"orders___user_id\" = \"user\".\"user___user_id\""));
}

#[test]
fn test_context_placeholder_binds_per_compile() {
    let repo = parse_schema(SCHEMA).unwrap();
    let query = Query::new().metric("user.visible_count");

    for tenant in [1, 2] {
        let options = CompileOptions::default()
            .with_dialect(Dialect::Postgres)
            .with_context(json!({"tenant": {"id": tenant}}));
        let compiled = compile(&repo, &query, &options).unwrap();
        assert!(compiled.sql.contains("= $1 then 1 end)"));
        assert_eq!(compiled.bindings, vec![json!(tenant)]);
    }
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("semlayer_loader_{}.toml", std::process::id()));
    std::fs::write(&path, SCHEMA).unwrap();
    let repo = load_schema(&path);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(repo.unwrap().models().len(), 2);
}

#[test]
fn test_missing_file() {
    let err = load_schema("/definitely/not/here/schema.toml").unwrap_err();
    assert!(matches!(err, LoaderError::FileNotFound(_)));
}

#[test]
fn test_missing_primary_key_is_rejected() {
    let source = r#"
[[models]]
name = "user"

[[models.dimensions]]
name = "first_name"
"#;
    let err = parse_schema(source).unwrap_err();
    assert!(matches!(
        err,
        LoaderError::Semantic(SemanticError::InvalidModel(_))
    ));
}

#[test]
fn test_unknown_field_is_rejected() {
    let source = r#"
[[models]]
name = "user"
tabel = "users"
"#;
    assert!(matches!(parse_schema(source), Err(LoaderError::Parse(_))));
}

#[test]
fn test_column_in_join_condition_is_rejected() {
    let source = r#"
[[models]]
name = "a"
[[models.dimensions]]
name = "id"
primary_key = true

[[models]]
name = "b"
[[models.dimensions]]
name = "id"
primary_key = true

[[joins]]
from = "a"
to = "b"
cardinality = "oneToOne"
condition = "{column:id} = {to:id}"
"#;
    assert!(matches!(
        parse_schema(source),
        Err(LoaderError::Template { .. })
    ));
}
