//! Tests for repository construction and member resolution.

use semlayer::format::Format;
use semlayer::model::{
    Cardinality, Dimension, DimensionType, Granularity, Join, Metric, Model, SqlTemplate,
};
use semlayer::semantic::{Member, MemberKind, Repository, SemanticError};

fn user() -> Model {
    Model::new("user")
        .dimension(Dimension::new("user_id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("first_name", DimensionType::String))
        .dimension(Dimension::new("signup_day", DimensionType::Date))
        .dimension(Dimension::new("login_at", DimensionType::Time))
        .metric(
            Metric::new("share", |_| SqlTemplate::from("avg(share)"))
                .with_format(Format::Percentage),
        )
}

fn orders() -> Model {
    Model::new("orders").dimension(Dimension::new("id", DimensionType::Number).primary_key())
}

fn link(from: &str, to: &str) -> Join {
    Join::new(from, to, Cardinality::ManyToOne, |_| SqlTemplate::new())
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_repository_is_shareable_across_threads() {
    assert_send_sync::<Repository>();
}

#[test]
fn test_two_primary_keys_are_rejected() {
    let model = user().dimension(Dimension::new("other", DimensionType::Number).primary_key());
    let err = Repository::builder().model(model).build().unwrap_err();
    assert!(matches!(err, SemanticError::InvalidModel(ref msg) if msg.contains("found 2")));
}

#[test]
fn test_duplicate_model_is_rejected() {
    let err = Repository::builder()
        .model(user())
        .model(user())
        .build()
        .unwrap_err();
    assert!(matches!(err, SemanticError::InvalidModel(_)));
}

#[test]
fn test_duplicate_member_is_rejected() {
    let model = user().dimension(Dimension::new("first_name", DimensionType::String));
    let err = Repository::builder().model(model).build().unwrap_err();
    assert!(matches!(err, SemanticError::InvalidModel(ref msg) if msg.contains("first_name")));
}

#[test]
fn test_member_name_with_separator_is_rejected() {
    let model = user().dimension(Dimension::new("a.b", DimensionType::String));
    let err = Repository::builder().model(model).build().unwrap_err();
    assert!(matches!(err, SemanticError::InvalidModel(_)));
}

#[test]
fn test_join_to_unknown_model_is_rejected() {
    let err = Repository::builder()
        .model(user())
        .join(link("orders", "user"))
        .build()
        .unwrap_err();
    assert_eq!(err, SemanticError::UnknownModel("orders".into()));
}

#[test]
fn test_self_join_is_rejected() {
    let err = Repository::builder()
        .model(user())
        .join(link("user", "user"))
        .build()
        .unwrap_err();
    assert!(matches!(err, SemanticError::InvalidModel(_)));
}

#[test]
fn test_graph_has_one_node_per_model_and_edge_per_join() {
    let repo = Repository::builder()
        .model(user())
        .model(orders())
        .join(link("orders", "user"))
        .build()
        .unwrap();
    assert_eq!(repo.graph().node_count(), 2);
    assert_eq!(repo.graph().edge_count(), 1);
}

#[test]
fn test_member_types_and_formats() {
    let repo = Repository::builder().model(user()).build().unwrap();

    let share = repo.get_member("user.share").unwrap();
    assert_eq!(share.kind(), MemberKind::Metric);
    assert_eq!(share.ty(), Some(DimensionType::Number));
    assert_eq!(share.format().map(|f| f.name()), Some("percentage"));

    let month_num = repo.get_member("user.signup_day.month_num").unwrap();
    assert_eq!(month_num.kind(), MemberKind::Dimension);
    assert_eq!(month_num.ty(), Some(DimensionType::Number));
    assert_eq!(month_num.path(), "user.signup_day.month_num");

    let max_day = repo.get_member("user.signup_day.adhoc_max").unwrap();
    assert_eq!(max_day.kind(), MemberKind::Metric);
    assert_eq!(max_day.ty(), Some(DimensionType::Date));
}

#[test]
fn test_granularities_follow_dimension_type() {
    let repo = Repository::builder().model(user()).build().unwrap();

    assert!(matches!(
        repo.get_member("user.login_at.hour").unwrap(),
        Member::Granularity {
            granularity: Granularity::Hour,
            ..
        }
    ));
    assert!(repo.get_member("user.login_at.year").is_err());
    assert!(repo.get_member("user.signup_day.hour").is_err());

    let paths = repo.member_paths();
    let day_paths: Vec<&String> = paths
        .iter()
        .filter(|p| p.starts_with("user.signup_day."))
        .collect();
    assert_eq!(day_paths.len(), 9);
}

#[test]
fn test_unknown_adhoc_aggregate() {
    let repo = Repository::builder().model(user()).build().unwrap();
    let err = repo.get_member("user.user_id.adhoc_median").unwrap_err();
    assert!(matches!(err, SemanticError::MemberNotFound { .. }));
}

#[test]
fn test_unknown_model_in_path() {
    let repo = Repository::builder().model(user()).build().unwrap();
    let err = repo.get_member("account.id").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Member 'account.id' not found: unknown model 'account'"
    );
}
