//! Types for address clustering
//!
//! Events, edge weights, clustering strategies and the tabular outputs of the
//! clustering pipeline.

use crate::analytics::records::{lenient_f64, Address, TxHash};
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identifier of a cluster within one clustering call
pub type ClusterId = usize;

/// Kind of on-chain event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Transfer,
    Swap,
    Other(String),
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRANSFER" => EventType::Transfer,
            "SWAP" => EventType::Swap,
            _ => EventType::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Transfer => "TRANSFER".to_string(),
            EventType::Swap => "SWAP".to_string(),
            EventType::Other(other) => other,
        }
    }
}

/// One observed value movement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    #[serde(default)]
    pub from_address: Address,
    #[serde(default)]
    pub to_address: Address,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub tx_hash: Option<TxHash>,
    #[serde(default, rename = "type")]
    pub event_type: Option<EventType>,
    /// Sole participant of a swap event
    #[serde(default)]
    pub address: Option<Address>,
}

impl TransferEvent {
    /// Build a TRANSFER event
    pub fn transfer(from: impl Into<Address>, to: impl Into<Address>, amount: f64) -> Self {
        Self {
            from_address: from.into(),
            to_address: to.into(),
            amount: Some(amount),
            event_type: Some(EventType::Transfer),
            ..Default::default()
        }
    }

    /// Build a SWAP event for a single address
    pub fn swap(address: impl Into<Address>) -> Self {
        Self {
            address: Some(address.into()),
            event_type: Some(EventType::Swap),
            ..Default::default()
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<TxHash>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    /// Amount, or 0.0 when absent
    pub fn amount_or_zero(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }

    /// Untyped events count as transfers
    pub fn is_transfer(&self) -> bool {
        matches!(self.event_type, None | Some(EventType::Transfer))
    }

    pub fn is_swap(&self) -> bool {
        matches!(self.event_type, Some(EventType::Swap))
    }

    /// Non-empty tx hash, if any
    pub fn tx_hash(&self) -> Option<&str> {
        self.tx_hash.as_deref().filter(|h| !h.is_empty())
    }
}

/// Accumulated relationship between two addresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeWeight {
    /// Summed transfer amount or co-occurrence count
    pub weight: f64,
    /// Number of contributing observations
    pub count: u64,
}

/// Partitioning strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterAlgorithm {
    /// Each connected component is one cluster
    ConnectedComponents,
    /// Greedy modularity community detection
    Louvain,
}

impl ClusterAlgorithm {
    /// Next strategy to try when this one is unavailable
    pub fn fallback(self) -> Option<ClusterAlgorithm> {
        match self {
            ClusterAlgorithm::Louvain => Some(ClusterAlgorithm::ConnectedComponents),
            ClusterAlgorithm::ConnectedComponents => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClusterAlgorithm::ConnectedComponents => "connected_components",
            ClusterAlgorithm::Louvain => "louvain",
        }
    }
}

impl fmt::Display for ClusterAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterAlgorithm {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connected_components" => Ok(ClusterAlgorithm::ConnectedComponents),
            "louvain" => Ok(ClusterAlgorithm::Louvain),
            other => Err(AnalysisError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Mapping address -> cluster id produced by one clustering call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterAssignment {
    clusters: BTreeMap<Address, ClusterId>,
}

impl ClusterAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: impl Into<Address>, cluster_id: ClusterId) {
        self.clusters.insert(address.into(), cluster_id);
    }

    pub fn get(&self, address: &str) -> Option<ClusterId> {
        self.clusters.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, ClusterId)> {
        self.clusters.iter().map(|(a, &c)| (a, c))
    }

    /// Number of distinct cluster ids
    pub fn cluster_count(&self) -> usize {
        self.clusters.values().collect::<BTreeSet<_>>().len()
    }

    /// Clusters as a set of address sets, independent of numbering
    pub fn partition(&self) -> BTreeSet<BTreeSet<Address>> {
        self.members().into_values().collect()
    }

    /// Members grouped by cluster id
    pub fn members(&self) -> BTreeMap<ClusterId, BTreeSet<Address>> {
        let mut members: BTreeMap<ClusterId, BTreeSet<Address>> = BTreeMap::new();
        for (address, &id) in &self.clusters {
            members.entry(id).or_default().insert(address.clone());
        }
        members
    }
}

impl FromIterator<(Address, ClusterId)> for ClusterAssignment {
    fn from_iter<T: IntoIterator<Item = (Address, ClusterId)>>(iter: T) -> Self {
        Self {
            clusters: iter.into_iter().collect(),
        }
    }
}

/// One row of the per-address table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressClusterRow {
    pub address: Address,
    pub cluster_id: ClusterId,
    /// Holder balance; `None` when the holder list lacks the address or column
    pub balance: Option<f64>,
    pub percentage: Option<f64>,
}

/// Summary statistics for one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub cluster_id: ClusterId,
    pub address_count: usize,
    /// Present only when the holder list carries balances
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_balance: Option<f64>,
    /// Present only when the holder list carries percentages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_percentage: Option<f64>,
}

/// A holder whose address belongs to no cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnclusteredRow {
    pub address: Address,
    pub balance: Option<f64>,
    pub percentage: Option<f64>,
}

/// Holders left outside every cluster, reported as one non-cluster group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnclusteredHolders {
    /// Ordered by balance descending, then address
    pub addresses: Vec<UnclusteredRow>,
    pub address_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_percentage: Option<f64>,
}

impl UnclusteredHolders {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Per-address and per-cluster tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterAnalysis {
    pub addresses: Vec<AddressClusterRow>,
    pub stats: Vec<ClusterStats>,
    /// Holders absent from the graph; always listed after the clusters
    #[serde(default, skip_serializing_if = "UnclusteredHolders::is_empty")]
    pub unclustered: UnclusteredHolders,
}

impl ClusterAnalysis {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.stats.is_empty() && self.unclustered.is_empty()
    }
}

/// Structural metrics of an address graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub total_weight: f64,
    /// edges / possible undirected edges
    pub density: f64,
    pub component_count: usize,
}

/// Result of one graph -> cluster -> aggregate stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStage {
    /// Strategy that actually produced the clusters
    pub algorithm: ClusterAlgorithm,
    pub summary: GraphSummary,
    pub cluster_count: usize,
    pub modularity: f64,
    pub assignment: ClusterAssignment,
    pub analysis: ClusterAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<PathBuf>,
}

/// Combined result of the full cluster analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer: Option<ClusterStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction: Option<ClusterStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co_spend: Option<ClusterStage>,
}

impl ClusterReport {
    pub fn is_empty(&self) -> bool {
        self.transfer.is_none() && self.interaction.is_none() && self.co_spend.is_none()
    }
}

/// Configuration for the clustering pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterAnalyzerConfig {
    /// Transfers below this amount are ignored by the transfer graph
    pub min_transfer_amount: f64,
    pub transfer_algorithm: ClusterAlgorithm,
    pub interaction_algorithm: ClusterAlgorithm,
    /// Also run the co-spend stage
    pub include_co_spend: bool,
    /// Write a DOT rendering per stage when an output directory is given
    pub render_visualizations: bool,
    /// Use edge weights in modularity scoring
    pub modularity_weighted: bool,
    /// Only nodes with a higher degree get a label in renderings
    pub label_min_degree: usize,
}

impl Default for ClusterAnalyzerConfig {
    fn default() -> Self {
        Self {
            min_transfer_amount: 0.0,
            transfer_algorithm: ClusterAlgorithm::ConnectedComponents,
            interaction_algorithm: ClusterAlgorithm::Louvain,
            include_co_spend: false,
            render_visualizations: true,
            modularity_weighted: false,
            label_min_degree: 2,
        }
    }
}
