//! Tests for the join graph optimizer.

use semlayer::model::{Cardinality, Dimension, DimensionType, Join, Model, Priority, SqlTemplate};
use semlayer::semantic::{optimize, Repository, SemanticError};

fn model(name: &str) -> Model {
    Model::new(name).dimension(Dimension::new("id", DimensionType::Number).primary_key())
}

fn join(from: &str, to: &str, cardinality: Cardinality) -> Join {
    Join::new(from, to, cardinality, |_| SqlTemplate::new())
}

/// Star-ish schema:
///
/// ```text
/// sales ─N:1─ products ─N:1─ categories
///   │
///  N:1
///   │
/// stores ─N:1─ regions        archive (isolated)
/// ```
fn create_test_repository() -> Repository {
    Repository::builder()
        .model(model("sales"))
        .model(model("products"))
        .model(model("categories"))
        .model(model("stores"))
        .model(model("regions"))
        .model(model("archive"))
        .join(join("sales", "products", Cardinality::ManyToOne))
        .join(join("products", "categories", Cardinality::ManyToOne))
        .join(join("sales", "stores", Cardinality::ManyToOne))
        .join(join("stores", "regions", Cardinality::ManyToOne))
        .build()
        .unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_single_model_is_one_node_no_edges() {
    let repo = create_test_repository();
    for name in ["sales", "regions", "archive"] {
        let tree = optimize(repo.graph(), &names(&[name])).unwrap();
        assert_eq!(tree.models, names(&[name]));
        assert!(tree.edges.is_empty());
    }
}

#[test]
fn test_result_is_connected_and_uses_declared_joins() {
    let repo = create_test_repository();
    let requests: [&[&str]; 4] = [
        &["sales", "products"],
        &["categories", "regions"],
        &["products", "stores", "categories"],
        &["regions", "sales", "categories", "products"],
    ];

    for request in requests {
        let tree = optimize(repo.graph(), &names(request)).unwrap();
        assert!(tree.is_connected(), "not connected for {:?}", request);
        for name in request {
            assert!(tree.contains(name));
        }
        for edge in &tree.edges {
            let declared = repo.join(edge.join).unwrap();
            assert!(
                (declared.from == edge.from && declared.to == edge.to)
                    || (declared.from == edge.to && declared.to == edge.from),
                "edge {:?} does not match declared join",
                edge
            );
        }
        // A tree over n models has n - 1 edges.
        assert_eq!(tree.edges.len(), tree.models.len() - 1);
    }
}

#[test]
fn test_path_through_intermediate_models() {
    let repo = create_test_repository();
    let tree = optimize(repo.graph(), &names(&["categories", "regions"])).unwrap();

    assert_eq!(tree.models.len(), 5);
    assert!(tree.contains("sales"));
    assert!(tree.contains("products"));
    assert!(tree.contains("stores"));
}

#[test]
fn test_unreachable_pair_fails() {
    let repo = create_test_repository();
    let err = optimize(repo.graph(), &names(&["sales", "archive"])).unwrap_err();
    assert_eq!(
        err,
        SemanticError::NoPath {
            from: "sales".into(),
            to: "archive".into()
        }
    );
}

#[test]
fn test_priority_steers_path_choice() {
    // Two routes a → d: via b (low priority) or via c (high priority).
    let repo = Repository::builder()
        .model(model("a"))
        .model(model("b"))
        .model(model("c"))
        .model(model("d"))
        .join(join("a", "b", Cardinality::ManyToOne).with_priority(Priority::Low))
        .join(join("b", "d", Cardinality::ManyToOne).with_priority(Priority::Low))
        .join(join("a", "c", Cardinality::ManyToOne).with_priority(Priority::High))
        .join(join("c", "d", Cardinality::ManyToOne).with_priority(Priority::High))
        .build()
        .unwrap();

    let tree = optimize(repo.graph(), &names(&["a", "d"])).unwrap();
    assert_eq!(tree.models, names(&["a", "d", "c"]));
    let joins: Vec<usize> = tree.edges.iter().map(|e| e.join).collect();
    assert_eq!(joins, vec![2, 3]);
}

#[test]
fn test_duplicate_requests_are_ignored() {
    let repo = create_test_repository();
    let tree = optimize(repo.graph(), &names(&["sales", "sales", "stores"])).unwrap();
    assert_eq!(tree.models, names(&["sales", "stores"]));
    assert_eq!(tree.edges.len(), 1);
}
