//! Address Clustering Algorithm
//!
//! Partitions an address graph into disjoint clusters, either by connected
//! components or by greedy modularity community detection.

use super::graph_builder::AddressGraph;
use super::types::*;
use crate::analytics::records::Address;
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Address clustering analyzer
#[derive(Debug, Clone, Default)]
pub struct AddressClusterer {
    /// Use edge weights when scoring modularity
    weighted: bool,
}

impl AddressClusterer {
    /// Create a new clusterer
    pub fn new(weighted: bool) -> Self {
        Self { weighted }
    }

    /// Partition the graph with the requested strategy.
    ///
    /// Returns the assignment together with the strategy that actually produced it,
    /// which differs from `algorithm` when a fallback was taken.
    pub fn cluster_addresses(
        &self,
        graph: &AddressGraph,
        algorithm: ClusterAlgorithm,
    ) -> (ClusterAssignment, ClusterAlgorithm) {
        if graph.is_empty() {
            return (ClusterAssignment::new(), algorithm);
        }

        let mut current = algorithm;
        loop {
            let communities = match current {
                ClusterAlgorithm::ConnectedComponents => Some(connected_components(graph)),
                ClusterAlgorithm::Louvain => modularity_communities(graph, self.weighted),
            };

            match (communities, current.fallback()) {
                (Some(communities), _) => {
                    let assignment = to_assignment(graph, &communities);
                    info!(
                        "Clustered {} addresses into {} clusters using {}",
                        assignment.len(),
                        communities.len(),
                        current
                    );
                    return (assignment, current);
                }
                (None, Some(next)) => {
                    warn!("{} clustering unavailable, falling back to {}", current, next);
                    current = next;
                }
                (None, None) => {
                    // connected components never yields None
                    return (ClusterAssignment::new(), current);
                }
            }
        }
    }

    /// Modularity of an assignment on this clusterer's weighting
    pub fn modularity(&self, graph: &AddressGraph, assignment: &ClusterAssignment) -> f64 {
        modularity(graph, assignment, self.weighted)
    }
}

/// Cluster with default (unweighted) settings, returning only the assignment
pub fn cluster_addresses(graph: &AddressGraph, algorithm: ClusterAlgorithm) -> ClusterAssignment {
    AddressClusterer::default()
        .cluster_addresses(graph, algorithm)
        .0
}

/// Connected components as lists of node indices, in node discovery order
fn connected_components(graph: &AddressGraph) -> Vec<Vec<usize>> {
    let g = graph.graph();
    let mut sets = UnionFind::new(g.node_count());
    for edge in g.edge_references() {
        sets.union(edge.source().index(), edge.target().index());
    }

    let labels = sets.into_labeling();
    let mut component_of_root: HashMap<usize, usize> = HashMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for (node, root) in labels.into_iter().enumerate() {
        let id = *component_of_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[id].push(node);
    }

    debug!("Found {} connected components", components.len());
    components
}

fn to_assignment(graph: &AddressGraph, communities: &[Vec<usize>]) -> ClusterAssignment {
    let g = graph.graph();
    communities
        .iter()
        .enumerate()
        .flat_map(|(cluster_id, nodes)| {
            nodes.iter().map(move |&node| {
                let address: Address = g[petgraph::graph::NodeIndex::new(node)].clone();
                (address, cluster_id)
            })
        })
        .collect()
}

fn edge_value(edge: &EdgeWeight, weighted: bool) -> f64 {
    if weighted {
        edge.weight
    } else {
        1.0
    }
}

/// Newman modularity `Q = Σ_c [ L_c / m - (d_c / 2m)^2 ]` of an assignment.
///
/// Returns 0.0 for graphs without edge weight.
pub fn modularity(graph: &AddressGraph, assignment: &ClusterAssignment, weighted: bool) -> f64 {
    let g = graph.graph();
    let m: f64 = g
        .raw_edges()
        .iter()
        .map(|e| edge_value(&e.weight, weighted))
        .sum();
    if m <= 0.0 {
        return 0.0;
    }

    let mut internal: HashMap<ClusterId, f64> = HashMap::new();
    let mut degree: HashMap<ClusterId, f64> = HashMap::new();

    for edge in g.edge_references() {
        let w = edge_value(edge.weight(), weighted);
        let a = assignment.get(&g[edge.source()]);
        let b = assignment.get(&g[edge.target()]);

        if let Some(a) = a {
            *degree.entry(a).or_default() += w;
        }
        if let Some(b) = b {
            *degree.entry(b).or_default() += w;
        }
        if let (Some(a), Some(b)) = (a, b) {
            if a == b {
                *internal.entry(a).or_default() += w;
            }
        }
    }

    degree
        .iter()
        .map(|(cluster, d)| {
            let l = internal.get(cluster).copied().unwrap_or(0.0);
            l / m - (d / (2.0 * m)).powi(2)
        })
        .sum()
}

#[cfg(feature = "modularity")]
fn modularity_communities(graph: &AddressGraph, weighted: bool) -> Option<Vec<Vec<usize>>> {
    greedy_modularity::communities(graph, weighted)
}

#[cfg(not(feature = "modularity"))]
fn modularity_communities(_graph: &AddressGraph, _weighted: bool) -> Option<Vec<Vec<usize>>> {
    None
}

/// Clauset-Newman-Moore agglomerative modularity maximisation
#[cfg(feature = "modularity")]
mod greedy_modularity {
    use super::{edge_value, AddressGraph};
    use petgraph::visit::EdgeRef;
    use std::collections::BTreeMap;
    use tracing::debug;

    /// Communities as lists of node indices, largest first.
    ///
    /// Returns `None` when the graph carries no edge weight, since modularity is
    /// undefined there.
    pub(super) fn communities(graph: &AddressGraph, weighted: bool) -> Option<Vec<Vec<usize>>> {
        let g = graph.graph();
        let n = g.node_count();
        let two_m: f64 = 2.0
            * g.raw_edges()
                .iter()
                .map(|e| edge_value(&e.weight, weighted))
                .sum::<f64>();
        if two_m <= 0.0 {
            return None;
        }

        // e[i][j]: fraction of edge ends joining communities i and j (both directions stored)
        let mut e: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
        // a[i]: fraction of edge ends attached to community i
        let mut a = vec![0.0; n];
        for edge in g.edge_references() {
            let (i, j) = (edge.source().index(), edge.target().index());
            let w = edge_value(edge.weight(), weighted) / two_m;
            *e[i].entry(j).or_default() += w;
            *e[j].entry(i).or_default() += w;
            a[i] += w;
            a[j] += w;
        }

        let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut alive = vec![true; n];
        let mut merges = 0;

        loop {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in (0..n).filter(|&i| alive[i]) {
                for (&j, &e_ij) in e[i].range(i + 1..) {
                    let dq = 2.0 * (e_ij - a[i] * a[j]);
                    if best.map_or(true, |(_, _, b)| dq > b) {
                        best = Some((i, j, dq));
                    }
                }
            }

            let Some((i, j, dq)) = best else { break };
            if dq <= 0.0 {
                break;
            }

            // merge j into i
            let e_j = std::mem::take(&mut e[j]);
            for (k, e_jk) in e_j {
                if k == i {
                    continue;
                }
                e[k].remove(&j);
                *e[k].entry(i).or_default() += e_jk;
                *e[i].entry(k).or_default() += e_jk;
            }
            e[i].remove(&j);
            a[i] += a[j];
            a[j] = 0.0;
            let moved = std::mem::take(&mut members[j]);
            members[i].extend(moved);
            alive[j] = false;
            merges += 1;
        }

        let mut communities: Vec<Vec<usize>> = members
            .into_iter()
            .filter(|m| !m.is_empty())
            .map(|mut m| {
                m.sort_unstable();
                m
            })
            .collect();
        communities.sort_by(|x, y| y.len().cmp(&x.len()).then(x[0].cmp(&y[0])));

        debug!(
            "Greedy modularity: {} merges, {} communities",
            merges,
            communities.len()
        );
        Some(communities)
    }
}
