//! Join graph optimizer.
//!
//! Given the set of models a query touches, pick a low-weight connected
//! subgraph of declared joins spanning them. This is the metric-closure
//! approximation of a Steiner tree:
//!
//! 1. Floyd–Warshall over the whole graph (distance + predecessor tables).
//! 2. A complete graph over the requested models, weighted by distance.
//! 3. Kruskal's MST over that complete graph. Ties keep input order.
//! 4. Each MST edge expanded back into the real joins along its path.
//!
//! The result only ever contains declared joins and is connected. It is not
//! guaranteed to be the minimum Steiner tree.

use std::collections::HashSet;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use tracing::debug;

use super::JoinGraph;
use crate::semantic::error::{SemanticError, SemanticResult};

/// One real join used by a [`JoinTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTreeEdge {
    pub from: String,
    pub to: String,
    /// Index into the repository's join list.
    pub join: usize,
}

/// Connected join subgraph spanning a requested model set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinTree {
    /// Requested models first, then models added to realize joins.
    pub models: Vec<String>,
    pub edges: Vec<JoinTreeEdge>,
}

impl JoinTree {
    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Edges touching `model`, with the model on the other side.
    pub fn neighbors<'a>(
        &'a self,
        model: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a JoinTreeEdge)> {
        self.edges.iter().filter_map(move |e| {
            if e.from == model {
                Some((e.to.as_str(), e))
            } else if e.to == model {
                Some((e.from.as_str(), e))
            } else {
                None
            }
        })
    }

    /// Whether every model is reachable from the first one over `edges`.
    pub fn is_connected(&self) -> bool {
        let Some(first) = self.models.first() else {
            return true;
        };
        let mut seen: HashSet<&str> = HashSet::from([first.as_str()]);
        let mut stack = vec![first.as_str()];
        while let Some(model) = stack.pop() {
            for (other, _) in self.neighbors(model) {
                if seen.insert(other) {
                    stack.push(other);
                }
            }
        }
        self.models.iter().all(|m| seen.contains(m.as_str()))
    }
}

/// All-pairs shortest paths with predecessors.
struct ShortestPaths {
    dist: Vec<Vec<Option<u64>>>,
    /// `pred[i][j]`: node before `j` on the shortest path from `i`.
    pred: Vec<Vec<Option<usize>>>,
    /// Cheapest direct edge between two nodes.
    direct: Vec<Vec<Option<EdgeIndex>>>,
}

impl ShortestPaths {
    fn floyd_warshall(graph: &JoinGraph) -> Self {
        let n = graph.node_count();
        let mut dist = vec![vec![None; n]; n];
        let mut pred = vec![vec![None; n]; n];
        let mut direct: Vec<Vec<Option<EdgeIndex>>> = vec![vec![None; n]; n];

        for (i, row) in dist.iter_mut().enumerate() {
            row[i] = Some(0);
        }

        for edge in graph.inner().edge_references() {
            let (u, v) = (edge.source().index(), edge.target().index());
            let w = u64::from(edge.weight().weight);
            if shorter(dist[u][v], w) {
                dist[u][v] = Some(w);
                dist[v][u] = Some(w);
                pred[u][v] = Some(u);
                pred[v][u] = Some(v);
                direct[u][v] = Some(edge.id());
                direct[v][u] = Some(edge.id());
            }
        }

        for k in 0..n {
            for i in 0..n {
                let Some(ik) = dist[i][k] else { continue };
                for j in 0..n {
                    let Some(kj) = dist[k][j] else { continue };
                    let candidate = ik + kj;
                    if shorter(dist[i][j], candidate) {
                        dist[i][j] = Some(candidate);
                        pred[i][j] = pred[k][j];
                    }
                }
            }
        }

        Self { dist, pred, direct }
    }

    /// Real edges along the path `from -> to`, walked back from `to`.
    fn path_edges(
        &self,
        graph: &JoinGraph,
        from: usize,
        to: usize,
    ) -> SemanticResult<Vec<(usize, usize, EdgeIndex)>> {
        let broken = || SemanticError::JoinPathReconstruction {
            from: graph.model_name(NodeIndex::new(from)).to_string(),
            to: graph.model_name(NodeIndex::new(to)).to_string(),
        };

        let mut edges = vec![];
        let mut current = to;
        while current != from {
            if edges.len() > self.dist.len() {
                return Err(broken());
            }
            let prev = self.pred[from][current].ok_or_else(broken)?;
            let edge = self.direct[prev][current].ok_or_else(broken)?;
            edges.push((prev, current, edge));
            current = prev;
        }
        edges.reverse();
        Ok(edges)
    }
}

/// Whether `candidate` improves on `current`.
fn shorter(current: Option<u64>, candidate: u64) -> bool {
    match current {
        None => true,
        Some(current) => candidate < current,
    }
}

/// Compute the join tree spanning `requested`.
///
/// Fails with `UnknownModel` for a model outside the graph, `NoPath` when two
/// requested models are disconnected, and `JoinPathReconstruction` when the
/// predecessor table is inconsistent.
pub fn optimize(graph: &JoinGraph, requested: &[String]) -> SemanticResult<JoinTree> {
    let mut models: Vec<String> = vec![];
    let mut nodes: Vec<usize> = vec![];
    for name in requested {
        if models.contains(name) {
            continue;
        }
        let node = graph
            .node(name)
            .ok_or_else(|| SemanticError::UnknownModel(name.clone()))?;
        models.push(name.clone());
        nodes.push(node.index());
    }

    if nodes.len() <= 1 {
        return Ok(JoinTree {
            models,
            edges: vec![],
        });
    }

    let paths = ShortestPaths::floyd_warshall(graph);

    // Complete graph over the requested models, in input order.
    let mut candidates: Vec<(usize, usize, u64)> = vec![];
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            match paths.dist[nodes[i]][nodes[j]] {
                Some(w) => candidates.push((i, j, w)),
                None => {
                    return Err(SemanticError::NoPath {
                        from: models[i].clone(),
                        to: models[j].clone(),
                    })
                }
            }
        }
    }

    // Kruskal. `sort_by_key` is stable, so equal weights keep input order.
    candidates.sort_by_key(|&(_, _, w)| w);
    let mut components = UnionFind::<usize>::new(nodes.len());
    let mut spanning = vec![];
    for (i, j, w) in candidates {
        if components.union(i, j) {
            spanning.push((i, j, w));
        }
    }

    let mut tree = JoinTree {
        models,
        edges: vec![],
    };
    let mut used: HashSet<EdgeIndex> = HashSet::new();
    for (i, j, _) in spanning {
        for (prev, next, edge) in paths.path_edges(graph, nodes[i], nodes[j])? {
            if !used.insert(edge) {
                continue;
            }
            let from = graph.model_name(NodeIndex::new(prev)).to_string();
            let to = graph.model_name(NodeIndex::new(next)).to_string();
            for name in [&from, &to] {
                if !tree.contains(name) {
                    tree.models.push(name.clone());
                }
            }
            tree.edges.push(JoinTreeEdge {
                from,
                to,
                join: graph.edge(edge).join,
            });
        }
    }

    debug!(
        models = ?tree.models,
        edges = tree.edges.len(),
        "join tree computed"
    );

    Ok(tree)
}
