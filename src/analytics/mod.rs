//! Analytics module - address clustering and temporal holder patterns
//!
//! The two pipelines are independent: clustering works on transfer events,
//! holder patterns on time-stamped holder snapshots. Both consume the shared
//! records in [`records`].

pub mod cluster_analyzer; // Transfer / interaction / co-spend clustering
pub mod holder_patterns; // Whale, trader, new entrant and disappeared holder detection
pub mod records;

// Re-export main types
pub use cluster_analyzer::{
    AddressClusterRow, AddressGraph, ClusterAlgorithm, ClusterAnalysis, ClusterAnalyzer,
    ClusterAnalyzerConfig, ClusterAssignment, ClusterReport, ClusterStage, ClusterStats,
    EventType, GraphSummary, TransferEvent, UnclusteredHolders, UnclusteredRow,
};
pub use holder_patterns::{
    AddressProfile, Confidence, DisappearedHolder, HolderPattern, HolderPatternAnalyzer,
    HolderPatternConfig, HolderPatternReport, PatternEntry, PatternSummary,
};
pub use records::{Address, HolderRecord, Snapshot, SnapshotRecord};
