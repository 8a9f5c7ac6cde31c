//! Address Cluster Analyzer
//!
//! Groups addresses that are likely controlled together, using graphs built
//! from transfer events.
//!
//! # Features
//!
//! - Transfer graph (edge weight = summed amount)
//! - Interaction graph (edge weight = shared transactions)
//! - Co-spend graph (senders of the same multi-input transaction)
//! - Connected-component or greedy-modularity clustering with fallback
//! - Per-cluster holding statistics joined from a holder list
//! - Optional DOT rendering per graph
//!
//! # Example
//!
//! ```no_run
//! use holder_lens::analytics::cluster_analyzer::{ClusterAnalyzer, ClusterAnalyzerConfig, TransferEvent};
//! use std::path::Path;
//!
//! let analyzer = ClusterAnalyzer::new(ClusterAnalyzerConfig::default());
//! let events = vec![
//!     TransferEvent::transfer("A", "B", 10.0).with_tx_hash("T1"),
//!     TransferEvent::transfer("B", "C", 5.0).with_tx_hash("T2"),
//! ];
//!
//! let report = analyzer.full_cluster_analysis(&events, &[], Some(Path::new("./output")));
//! if let Some(stage) = &report.transfer {
//!     println!("{} transfer clusters", stage.cluster_count);
//! }
//! ```

pub mod aggregation;
pub mod clustering;
pub mod graph_builder;
pub mod types;
pub mod visualization;

pub use aggregation::analyze_clusters;
use clustering::AddressClusterer;
pub use clustering::{cluster_addresses, modularity};
pub use graph_builder::{
    build_co_spend_graph, build_interaction_graph, build_transfer_graph,
    try_build_co_spend_graph, AddressGraph,
};
pub use types::*;

use crate::analytics::records::HolderRecord;
use std::path::Path;
use tracing::{info, instrument};

/// Main cluster analyzer
pub struct ClusterAnalyzer {
    /// Address clusterer
    clusterer: AddressClusterer,
    /// Configuration
    config: ClusterAnalyzerConfig,
}

impl ClusterAnalyzer {
    /// Create a new cluster analyzer
    pub fn new(config: ClusterAnalyzerConfig) -> Self {
        let clusterer = AddressClusterer::new(config.modularity_weighted);
        Self { clusterer, config }
    }

    /// Run transfer then interaction clustering (and co-spend when enabled).
    ///
    /// Stages whose graph yields no clusters are left out of the report. When
    /// `output_dir` is given and rendering is enabled, each stage writes a DOT file;
    /// rendering failures are logged and never fail the analysis.
    #[instrument(skip_all, fields(events = events.len(), holders = holders.len()))]
    pub fn full_cluster_analysis(
        &self,
        events: &[TransferEvent],
        holders: &[HolderRecord],
        output_dir: Option<&Path>,
    ) -> ClusterReport {
        info!("Starting full cluster analysis");

        let transfer_graph = build_transfer_graph(events, self.config.min_transfer_amount);
        let transfer = self.run_stage(
            "transfer",
            &transfer_graph,
            self.config.transfer_algorithm,
            holders,
            output_dir,
        );

        let interaction_graph = build_interaction_graph(events);
        let interaction = self.run_stage(
            "interaction",
            &interaction_graph,
            self.config.interaction_algorithm,
            holders,
            output_dir,
        );

        let co_spend = if self.config.include_co_spend {
            self.analyze_co_spend(&build_co_spend_graph(events), holders, output_dir)
        } else {
            None
        };

        let report = ClusterReport {
            transfer,
            interaction,
            co_spend,
        };

        info!(
            "Cluster analysis complete: transfer={}, interaction={}, co_spend={}",
            stage_clusters(&report.transfer),
            stage_clusters(&report.interaction),
            stage_clusters(&report.co_spend)
        );
        report
    }

    /// Cluster a prebuilt graph and aggregate it; `None` when nothing clusters
    pub fn analyze_graph(
        &self,
        graph: &AddressGraph,
        algorithm: ClusterAlgorithm,
        holders: &[HolderRecord],
    ) -> Option<ClusterStage> {
        let (assignment, used) = self.clusterer.cluster_addresses(graph, algorithm);
        if assignment.is_empty() {
            return None;
        }

        let analysis = analyze_clusters(&assignment, holders);
        Some(ClusterStage {
            algorithm: used,
            summary: graph.summary(),
            cluster_count: assignment.cluster_count(),
            modularity: self.clusterer.modularity(graph, &assignment),
            assignment,
            analysis,
            visualization: None,
        })
    }

    /// Cluster a co-spend graph with greedy modularity
    pub fn analyze_co_spend(
        &self,
        graph: &AddressGraph,
        holders: &[HolderRecord],
        output_dir: Option<&Path>,
    ) -> Option<ClusterStage> {
        self.run_stage(
            "co_spend",
            graph,
            ClusterAlgorithm::Louvain,
            holders,
            output_dir,
        )
    }

    fn run_stage(
        &self,
        name: &str,
        graph: &AddressGraph,
        algorithm: ClusterAlgorithm,
        holders: &[HolderRecord],
        output_dir: Option<&Path>,
    ) -> Option<ClusterStage> {
        let Some(mut stage) = self.analyze_graph(graph, algorithm, holders) else {
            info!("No {} clusters found, omitting stage", name);
            return None;
        };

        if let (true, Some(dir)) = (self.config.render_visualizations, output_dir) {
            stage.visualization = visualization::try_write_cluster_graph(
                graph,
                &stage.assignment,
                dir,
                name,
                self.config.label_min_degree,
            );
        }

        Some(stage)
    }

    /// Get configuration
    pub fn config(&self) -> &ClusterAnalyzerConfig {
        &self.config
    }
}

fn stage_clusters(stage: &Option<ClusterStage>) -> usize {
    stage.as_ref().map_or(0, |s| s.cluster_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyzer_creation() {
        let analyzer = ClusterAnalyzer::new(ClusterAnalyzerConfig::default());
        assert_eq!(
            analyzer.config().interaction_algorithm,
            ClusterAlgorithm::Louvain
        );
    }

    #[test]
    fn test_empty_events_produce_empty_report() {
        let analyzer = ClusterAnalyzer::new(ClusterAnalyzerConfig::default());
        let report = analyzer.full_cluster_analysis(&[], &[], None);
        assert!(report.is_empty());
        assert_eq!(serde_json::to_string(&report).unwrap(), "{}");
    }

    #[test]
    fn test_interaction_stage_omitted_without_tx_hashes() {
        let analyzer = ClusterAnalyzer::new(ClusterAnalyzerConfig::default());
        let events = vec![TransferEvent::transfer("a", "b", 1.0)];

        let report = analyzer.full_cluster_analysis(&events, &[], None);
        assert!(report.transfer.is_some());
        assert!(report.interaction.is_none());
        assert!(report.co_spend.is_none());
    }

    #[test]
    fn test_co_spend_stage_when_enabled() {
        let config = ClusterAnalyzerConfig {
            include_co_spend: true,
            ..Default::default()
        };
        let analyzer = ClusterAnalyzer::new(config);
        let events = vec![
            TransferEvent::transfer("a", "z", 1.0).with_tx_hash("t1"),
            TransferEvent::transfer("b", "z", 1.0).with_tx_hash("t1"),
        ];

        let report = analyzer.full_cluster_analysis(&events, &[], None);
        let stage = report.co_spend.unwrap();
        assert_eq!(stage.assignment.len(), 2);
        assert_eq!(stage.cluster_count, 1);
    }
}
