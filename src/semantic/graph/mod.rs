//! Weighted join graph over model names.
//!
//! One node per model, one undirected edge per declared join. Edge weights
//! come from the static [`join_weight`](crate::model::join_weight) table, so
//! they are always positive and shortest-path search is well defined.

pub mod optimizer;

pub use optimizer::{optimize, JoinTree, JoinTreeEdge};

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use std::collections::HashMap;

use crate::model::{Join, Model};

/// Edge payload: which declared join this edge came from, and its cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinEdge {
    /// Index into the repository's join list.
    pub join: usize,
    pub weight: u32,
}

/// The join graph.
#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
    graph: UnGraph<String, JoinEdge>,
    nodes: HashMap<String, NodeIndex>,
}

impl JoinGraph {
    /// Build the graph. O(models + joins).
    ///
    /// Joins naming unknown models are skipped; the repository validates
    /// them before calling this.
    pub fn build(models: &[Model], joins: &[Join]) -> Self {
        let mut graph = UnGraph::with_capacity(models.len(), joins.len());
        let mut nodes = HashMap::with_capacity(models.len());

        for model in models {
            let idx = graph.add_node(model.name.clone());
            nodes.insert(model.name.clone(), idx);
        }

        for (i, join) in joins.iter().enumerate() {
            if let (Some(&from), Some(&to)) = (nodes.get(&join.from), nodes.get(&join.to)) {
                graph.add_edge(
                    from,
                    to,
                    JoinEdge {
                        join: i,
                        weight: join.weight(),
                    },
                );
            }
        }

        Self { graph, nodes }
    }

    /// Node for a model name.
    pub fn node(&self, model: &str) -> Option<NodeIndex> {
        self.nodes.get(model).copied()
    }

    /// Model name at a node.
    pub fn model_name(&self, node: NodeIndex) -> &str {
        &self.graph[node]
    }

    /// Edge payload.
    pub fn edge(&self, edge: EdgeIndex) -> JoinEdge {
        self.graph[edge]
    }

    /// The underlying petgraph graph.
    pub fn inner(&self) -> &UnGraph<String, JoinEdge> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, Priority, SqlTemplate};

    #[test]
    fn test_one_edge_per_join() {
        let models = vec![Model::new("a"), Model::new("b"), Model::new("c")];
        let joins = vec![
            Join::new("a", "b", Cardinality::OneToMany, |_| SqlTemplate::new()),
            Join::new("b", "c", Cardinality::ManyToOne, |_| SqlTemplate::new())
                .with_priority(Priority::High),
        ];
        let graph = JoinGraph::build(&models, &joins);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        let b = graph.node("b").unwrap();
        assert_eq!(graph.model_name(b), "b");

        let weights: Vec<u32> = graph.inner().edge_weights().map(|e| e.weight).collect();
        assert_eq!(weights, vec![30, 2]);
    }
}
