//! Address Graph Builder
//!
//! Builds undirected weighted address graphs from transfer events. Three
//! relationships are supported: value transfers, co-participation in one
//! transaction, and co-spending (several senders in one transaction).

use super::types::*;
use crate::analytics::records::Address;
use crate::error::{AnalysisError, Result};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Undirected weighted graph over addresses
#[derive(Debug, Clone, Default)]
pub struct AddressGraph {
    /// The underlying undirected graph
    graph: UnGraph<Address, EdgeWeight>,
    /// Map from address to node index
    address_to_node: HashMap<Address, NodeIndex>,
}

impl AddressGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the node for an address
    pub fn get_or_create_node(&mut self, address: &str) -> NodeIndex {
        if let Some(&idx) = self.address_to_node.get(address) {
            return idx;
        }

        let idx = self.graph.add_node(address.to_string());
        self.address_to_node.insert(address.to_string(), idx);
        idx
    }

    /// Add `weight` to the edge between two distinct addresses, creating it if needed.
    /// Self-loops are ignored.
    pub fn accumulate_edge(&mut self, a: &str, b: &str, weight: f64) {
        if a == b {
            return;
        }

        let a_idx = self.get_or_create_node(a);
        let b_idx = self.get_or_create_node(b);

        match self.graph.find_edge(a_idx, b_idx) {
            Some(edge) => {
                let data = &mut self.graph[edge];
                data.weight += weight;
                data.count += 1;
            }
            None => {
                self.graph
                    .add_edge(a_idx, b_idx, EdgeWeight { weight, count: 1 });
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, address: &str) -> bool {
        self.address_to_node.contains_key(address)
    }

    /// Addresses in insertion order
    pub fn addresses(&self) -> Vec<Address> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Edge data between two addresses, in either direction
    pub fn edge(&self, a: &str, b: &str) -> Option<&EdgeWeight> {
        let a_idx = *self.address_to_node.get(a)?;
        let b_idx = *self.address_to_node.get(b)?;
        self.graph
            .find_edge(a_idx, b_idx)
            .map(|edge| &self.graph[edge])
    }

    /// Number of distinct neighbours of an address
    pub fn degree(&self, address: &str) -> usize {
        self.address_to_node
            .get(address)
            .map(|&idx| self.graph.neighbors(idx).count())
            .unwrap_or(0)
    }

    /// All edges as (a, b, data)
    pub fn edges(&self) -> impl Iterator<Item = (&Address, &Address, &EdgeWeight)> {
        self.graph.edge_references().map(move |edge| {
            (
                &self.graph[edge.source()],
                &self.graph[edge.target()],
                edge.weight(),
            )
        })
    }

    /// Sum of all edge weights
    pub fn total_weight(&self) -> f64 {
        self.graph.raw_edges().iter().map(|e| e.weight.weight).sum()
    }

    /// Number of connected components
    pub fn component_count(&self) -> usize {
        let mut sets = UnionFind::new(self.graph.node_count());
        for edge in self.graph.edge_references() {
            sets.union(edge.source().index(), edge.target().index());
        }
        sets.into_labeling().into_iter().collect::<BTreeSet<_>>().len()
    }

    /// Structural metrics
    pub fn summary(&self) -> GraphSummary {
        let node_count = self.node_count();
        let edge_count = self.edge_count();
        let n = node_count as f64;
        let density = if node_count > 1 {
            edge_count as f64 / (n * (n - 1.0) / 2.0)
        } else {
            0.0
        };

        GraphSummary {
            node_count,
            edge_count,
            total_weight: self.total_weight(),
            density,
            component_count: self.component_count(),
        }
    }

    /// Get the internal graph (for clustering algorithms)
    pub(crate) fn graph(&self) -> &UnGraph<Address, EdgeWeight> {
        &self.graph
    }
}

/// Build the transfer graph: one edge per address pair, weighted by summed amount.
///
/// Only TRANSFER (or untyped) events with `amount >= min_amount` and two distinct
/// non-empty endpoints contribute.
pub fn build_transfer_graph(events: &[TransferEvent], min_amount: f64) -> AddressGraph {
    let mut graph = AddressGraph::new();

    for event in events.iter().filter(|e| e.is_transfer()) {
        let amount = event.amount_or_zero();
        if event.from_address.is_empty() || event.to_address.is_empty() || amount < min_amount {
            continue;
        }
        graph.accumulate_edge(&event.from_address, &event.to_address, amount);
    }

    debug!(
        "Transfer graph: {} nodes, {} edges from {} events",
        graph.node_count(),
        graph.edge_count(),
        events.len()
    );
    graph
}

/// Build the interaction graph: addresses appearing in the same transaction are
/// linked, weight +1 per shared transaction.
///
/// Events without a tx hash cannot be grouped and are skipped.
pub fn build_interaction_graph(events: &[TransferEvent]) -> AddressGraph {
    let mut participants: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for event in events {
        let Some(tx_hash) = event.tx_hash() else {
            continue;
        };
        let group = participants.entry(tx_hash).or_default();

        if event.is_transfer() {
            group.insert(event.from_address.as_str());
            group.insert(event.to_address.as_str());
        } else if event.is_swap() {
            if let Some(address) = event.address.as_deref() {
                group.insert(address);
            }
        }
    }

    let mut graph = AddressGraph::new();
    for addresses in participants.values() {
        let addresses: Vec<&str> = addresses.iter().copied().filter(|a| !a.is_empty()).collect();
        link_all_pairs(&mut graph, &addresses);
    }

    debug!(
        "Interaction graph: {} nodes, {} edges from {} transactions",
        graph.node_count(),
        graph.edge_count(),
        participants.len()
    );
    graph
}

/// Build the co-spend graph: senders sharing a multi-input transaction are linked,
/// weight +1 per shared transaction.
///
/// When no transfer carries a tx hash the relationship cannot be derived; an empty
/// graph is returned and a warning is logged.
pub fn build_co_spend_graph(events: &[TransferEvent]) -> AddressGraph {
    match try_build_co_spend_graph(events) {
        Ok(graph) => graph,
        Err(e) => {
            warn!("Skipping co-spend analysis: {}", e);
            AddressGraph::new()
        }
    }
}

/// Strict variant of [`build_co_spend_graph`]: fails with
/// [`AnalysisError::MissingTxHash`] when transfers exist but none has a tx hash.
pub fn try_build_co_spend_graph(events: &[TransferEvent]) -> Result<AddressGraph> {
    let transfers: Vec<&TransferEvent> = events.iter().filter(|e| e.is_transfer()).collect();
    if transfers.is_empty() {
        return Ok(AddressGraph::new());
    }
    if transfers.iter().all(|e| e.tx_hash().is_none()) {
        return Err(AnalysisError::MissingTxHash);
    }

    let mut senders: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for event in transfers {
        if let Some(tx_hash) = event.tx_hash() {
            if !event.from_address.is_empty() {
                senders
                    .entry(tx_hash)
                    .or_default()
                    .insert(event.from_address.as_str());
            }
        }
    }

    let mut graph = AddressGraph::new();
    let mut multi_input = 0;
    for inputs in senders.values().filter(|s| s.len() > 1) {
        multi_input += 1;
        let inputs: Vec<&str> = inputs.iter().copied().collect();
        link_all_pairs(&mut graph, &inputs);
    }

    debug!(
        "Co-spend graph: {} nodes, {} edges from {} multi-input transactions",
        graph.node_count(),
        graph.edge_count(),
        multi_input
    );
    Ok(graph)
}

fn link_all_pairs(graph: &mut AddressGraph, addresses: &[&str]) {
    for (i, a) in addresses.iter().enumerate() {
        for b in &addresses[i + 1..] {
            graph.accumulate_edge(a, b, 1.0);
        }
    }
}
