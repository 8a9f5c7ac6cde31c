//! Integration tests for address clustering

use holder_lens::analytics::cluster_analyzer::{
    build_co_spend_graph, build_interaction_graph, build_transfer_graph, cluster_addresses,
    try_build_co_spend_graph, ClusterAlgorithm, ClusterAnalyzer, ClusterAnalyzerConfig,
};
use holder_lens::{AnalysisError, HolderRecord, TransferEvent};
use serde_json::json;
use std::collections::BTreeSet;

fn set(addresses: &[&str]) -> BTreeSet<String> {
    addresses.iter().map(|a| a.to_string()).collect()
}

#[test]
fn test_transfer_graph_accumulates_repeated_pairs() {
    let events = vec![
        TransferEvent::transfer("A", "B", 10.0),
        TransferEvent::transfer("B", "C", 5.0),
        TransferEvent::transfer("A", "B", 3.0),
    ];

    let graph = build_transfer_graph(&events, 0.0);
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);

    let ab = graph.edge("A", "B").unwrap();
    assert_eq!(ab.weight, 13.0);
    assert_eq!(ab.count, 2);
    // undirected lookup
    let bc = graph.edge("C", "B").unwrap();
    assert_eq!(bc.weight, 5.0);
    assert_eq!(bc.count, 1);

    let assignment = cluster_addresses(&graph, ClusterAlgorithm::ConnectedComponents);
    assert_eq!(assignment.cluster_count(), 1);
    assert_eq!(assignment.partition(), BTreeSet::from([set(&["A", "B", "C"])]));
}

#[test]
fn test_co_spend_links_senders_of_one_transaction() {
    let events = vec![
        TransferEvent::transfer("A", "X", 1.0).with_tx_hash("T1"),
        TransferEvent::transfer("B", "Y", 2.0).with_tx_hash("T1"),
    ];

    let graph = build_co_spend_graph(&events);
    assert_eq!(graph.edge_count(), 1);
    let ab = graph.edge("A", "B").unwrap();
    assert_eq!(ab.weight, 1.0);
    // receivers are not part of co-spend
    assert!(!graph.contains("X"));

    let assignment = cluster_addresses(&graph, ClusterAlgorithm::Louvain);
    assert_eq!(assignment.partition(), BTreeSet::from([set(&["A", "B"])]));
}

#[test]
fn test_co_spend_requires_tx_hash() {
    let events = vec![TransferEvent::transfer("A", "B", 1.0)];

    assert!(build_co_spend_graph(&events).is_empty());
    assert!(matches!(
        try_build_co_spend_graph(&events),
        Err(AnalysisError::MissingTxHash)
    ));
}

#[test]
fn test_graphs_never_contain_self_loops() {
    let events = vec![
        TransferEvent::transfer("A", "A", 50.0).with_tx_hash("T1"),
        TransferEvent::transfer("A", "B", 1.0).with_tx_hash("T1"),
        TransferEvent::swap("A").with_tx_hash("T1"),
    ];

    for graph in [
        build_transfer_graph(&events, 0.0),
        build_interaction_graph(&events),
        build_co_spend_graph(&events),
    ] {
        assert!(graph.edges().all(|(a, b, _)| a != b));
        assert!(graph.edge("A", "A").is_none());
    }
}

#[test]
fn test_min_amount_filter_is_strict() {
    let events = vec![
        TransferEvent::transfer("A", "B", 5.0),
        TransferEvent::transfer("C", "D", 4.99),
    ];

    let graph = build_transfer_graph(&events, 5.0);
    assert!(graph.contains("A"));
    assert!(!graph.contains("C"));
}

#[test]
fn test_clustering_is_deterministic_up_to_relabeling() {
    let events = vec![
        TransferEvent::transfer("a1", "a2", 1.0),
        TransferEvent::transfer("a2", "a3", 1.0),
        TransferEvent::transfer("a3", "a1", 1.0),
        TransferEvent::transfer("b1", "b2", 1.0),
        TransferEvent::transfer("b2", "b3", 1.0),
        TransferEvent::transfer("b3", "b1", 1.0),
        TransferEvent::transfer("a3", "b1", 1.0),
    ];
    let graph = build_transfer_graph(&events, 0.0);

    for algorithm in [ClusterAlgorithm::ConnectedComponents, ClusterAlgorithm::Louvain] {
        let first = cluster_addresses(&graph, algorithm);
        let second = cluster_addresses(&graph, algorithm);
        assert_eq!(first.partition(), second.partition());
        assert_eq!(first.len(), graph.node_count());
    }
}

#[test]
fn test_full_analysis_with_holders() {
    let events: Vec<TransferEvent> = serde_json::from_value(json!([
        {"from_address": "A", "to_address": "B", "amount": "10", "tx_hash": "T1", "type": "TRANSFER"},
        {"from_address": "B", "to_address": "C", "amount": 5, "tx_hash": "T2", "type": "TRANSFER"},
        {"from_address": "D", "to_address": "E", "amount": 1, "tx_hash": "T3", "type": "TRANSFER"},
        {"address": "A", "tx_hash": "T2", "type": "SWAP"}
    ]))
    .unwrap();
    let holders: Vec<HolderRecord> = serde_json::from_value(json!([
        {"address": "A", "balance": 100.0, "percentage": 10.0},
        {"address": "B", "balance": 50.0, "percentage": 5.0},
        {"address": "D", "balance": 1.0}
    ]))
    .unwrap();

    let analyzer = ClusterAnalyzer::new(ClusterAnalyzerConfig::default());
    let report = analyzer.full_cluster_analysis(&events, &holders, None);

    let transfer = report.transfer.unwrap();
    assert_eq!(transfer.algorithm, ClusterAlgorithm::ConnectedComponents);
    assert_eq!(transfer.cluster_count, 2);
    assert_eq!(
        transfer.assignment.partition(),
        BTreeSet::from([set(&["A", "B", "C"]), set(&["D", "E"])])
    );

    let stats = &transfer.analysis.stats;
    let total: usize = stats.iter().map(|s| s.address_count).sum();
    assert_eq!(total, transfer.assignment.len());
    // sorted by total balance, descending
    assert_eq!(stats[0].address_count, 3);
    assert_eq!(stats[0].total_balance, Some(150.0));
    assert_eq!(stats[1].total_balance, Some(1.0));

    let interaction = report.interaction.unwrap();
    assert!(interaction.assignment.get("A").is_some());
    assert!(interaction.assignment.get("C").is_some());
    assert!(report.co_spend.is_none());
}

#[test]
fn test_holders_outside_the_graph_stay_in_the_report() {
    let events = vec![TransferEvent::transfer("A", "B", 1.0)];
    let holders = vec![
        HolderRecord::new("A").with_balance(10.0),
        HolderRecord::new("Z").with_balance(900.0),
    ];

    let report = ClusterAnalyzer::new(ClusterAnalyzerConfig::default())
        .full_cluster_analysis(&events, &holders, None);
    let analysis = report.transfer.unwrap().analysis;

    let rows: Vec<_> = analysis.addresses.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(rows, vec!["A", "B"]);
    assert_eq!(analysis.stats[0].total_balance, Some(10.0));

    assert_eq!(analysis.unclustered.address_count, 1);
    assert_eq!(analysis.unclustered.addresses[0].address, "Z");
    assert_eq!(analysis.unclustered.total_balance, Some(900.0));

    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["unclustered"]["addresses"][0]["address"], "Z");
}

#[test]
fn test_visualizations_written_to_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let events = vec![
        TransferEvent::transfer("A", "B", 1.0).with_tx_hash("T1"),
        TransferEvent::transfer("C", "B", 1.0).with_tx_hash("T1"),
    ];
    let config = ClusterAnalyzerConfig {
        include_co_spend: true,
        ..Default::default()
    };

    let report = ClusterAnalyzer::new(config).full_cluster_analysis(&events, &[], Some(dir.path()));

    let transfer_dot = report.transfer.unwrap().visualization.unwrap();
    assert_eq!(transfer_dot, dir.path().join("transfer_clusters.dot"));
    let contents = std::fs::read_to_string(&transfer_dot).unwrap();
    assert!(contents.starts_with("graph {"));

    assert!(report.interaction.unwrap().visualization.is_some());
    assert!(report.co_spend.unwrap().visualization.is_some());
}

#[test]
fn test_rendering_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClusterAnalyzerConfig {
        render_visualizations: false,
        ..Default::default()
    };
    let events = vec![TransferEvent::transfer("A", "B", 1.0)];

    let report = ClusterAnalyzer::new(config).full_cluster_analysis(&events, &[], Some(dir.path()));
    assert!(report.transfer.unwrap().visualization.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_unknown_algorithm_name() {
    assert_eq!(
        "louvain".parse::<ClusterAlgorithm>().unwrap(),
        ClusterAlgorithm::Louvain
    );
    assert!(matches!(
        "spectral".parse::<ClusterAlgorithm>(),
        Err(AnalysisError::UnknownAlgorithm(name)) if name == "spectral"
    ));
}
