//! holder-lens - address clustering and holder-pattern analysis
//!
//! This crate turns transfer events and top-holder snapshots that were already
//! fetched from upstream analytics APIs into address clusters and behavioural
//! holder categories.

pub mod analytics;
pub mod error;
pub mod observability;
pub mod orchestrator;

// Re-export main types for convenience
pub use analytics::{
    ClusterAnalyzer, ClusterAnalyzerConfig, ClusterReport, HolderPatternAnalyzer,
    HolderPatternConfig, HolderPatternReport, HolderRecord, Snapshot, SnapshotRecord,
    TransferEvent,
};
pub use error::AnalysisError;
pub use orchestrator::AppConfig;
