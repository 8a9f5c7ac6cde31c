//! CLI for holder-lens
//!
//! Runs address clustering over transfer events and temporal pattern analysis
//! over holder snapshots. Reports are printed to stdout as JSON.

use anyhow::{Context, Result};
use holder_lens::analytics::cluster_analyzer::try_build_co_spend_graph;
use holder_lens::analytics::{ClusterReport, HolderPatternReport, Snapshot};
use holder_lens::observability::{init_observability, AnalysisMetrics};
use holder_lens::{
    AppConfig, ClusterAnalyzer, HolderPatternAnalyzer, HolderRecord, SnapshotRecord,
    TransferEvent,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let program = program_name(&args);

    if args.len() < 2 {
        print_usage(program);
        return Ok(());
    }

    let command = &args[1];

    if command == "init-config" {
        let path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH);
        AppConfig::default().to_toml_file(path)?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    let config = load_config()?;
    if let Err(e) = init_observability(config.observability()) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
    let metrics = AnalysisMetrics::new()?;

    match command.as_str() {
        "clusters" => {
            if args.len() < 3 {
                eprintln!("Usage: {} clusters <events.json> [holders.json]", program);
                return Ok(());
            }

            let events: Vec<TransferEvent> = read_json(&args[2]).await?;
            let holders: Vec<HolderRecord> = match args.get(3) {
                Some(path) => read_json(path).await?,
                None => Vec::new(),
            };

            let report = run_clusters(&config, &metrics, events, holders, false).await?;
            print_json(&report)?;
        }
        "co-spend" => {
            if args.len() < 3 {
                eprintln!("Usage: {} co-spend <events.json>", program);
                return Ok(());
            }

            let events: Vec<TransferEvent> = read_json(&args[2]).await?;
            let report = run_clusters(&config, &metrics, events, Vec::new(), true).await?;
            print_json(&report)?;
        }
        "patterns" => {
            if args.len() < 3 {
                eprintln!("Usage: {} patterns <snapshots.json>", program);
                return Ok(());
            }

            let records = read_snapshot_records(&args[2]).await?;
            let report = run_patterns(&config, &metrics, records).await?;
            print_json(&report)?;
        }
        "help" | "--help" | "-h" => {
            print_usage(program);
            return Ok(());
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage(program);
            return Ok(());
        }
    }

    if config.enable_metrics {
        write_metrics(&config.output_dir, &metrics).await;
    }

    Ok(())
}

fn print_usage(program_name: &str) {
    println!("holder-lens");
    println!("Address clustering and temporal holder pattern analysis");
    println!();
    println!("USAGE:");
    println!("    {} <COMMAND> [OPTIONS]", program_name);
    println!();
    println!("COMMANDS:");
    println!("    clusters <events.json> [holders.json]   Transfer and interaction clustering");
    println!("    co-spend <events.json>                  Co-spend clustering only");
    println!("    patterns <snapshots.json>               Whale / trader / new entrant detection");
    println!("    init-config [path]                      Write a default config.toml");
    println!("    help                                    Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    HOLDER_LENS_CONFIG       Config file path (default: config.toml)");
    println!("    HOLDER_LENS_OUTPUT_DIR   Directory for renderings and metrics");
    println!("    HOLDER_LENS_LOG_LEVEL    Log filter when RUST_LOG is unset");
}

fn load_config() -> Result<AppConfig> {
    let path = std::env::var("HOLDER_LENS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&path).exists() {
        AppConfig::from_toml_file(&path)
    } else {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

async fn run_clusters(
    config: &AppConfig,
    metrics: &AnalysisMetrics,
    events: Vec<TransferEvent>,
    holders: Vec<HolderRecord>,
    co_spend_only: bool,
) -> Result<ClusterReport> {
    let pipeline = if co_spend_only { "co_spend" } else { "clusters" };
    let cluster_config = config.cluster.clone();
    let output_dir = config.output_dir.clone();
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || -> Result<ClusterReport> {
        if co_spend_only {
            let analyzer = ClusterAnalyzer::new(cluster_config);
            let graph = try_build_co_spend_graph(&events)?;
            let co_spend = analyzer.analyze_co_spend(&graph, &holders, Some(&output_dir));
            Ok(ClusterReport {
                transfer: None,
                interaction: None,
                co_spend,
            })
        } else {
            let analyzer = ClusterAnalyzer::new(cluster_config);
            Ok(analyzer.full_cluster_analysis(&events, &holders, Some(&output_dir)))
        }
    })
    .await
    .context("Cluster analysis task panicked")?;

    metrics.record(pipeline, started.elapsed(), result.is_ok());
    result
}

async fn run_patterns(
    config: &AppConfig,
    metrics: &AnalysisMetrics,
    records: Vec<SnapshotRecord>,
) -> Result<HolderPatternReport> {
    let analyzer = HolderPatternAnalyzer::new(config.holder_patterns.clone());
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&records))
        .await
        .context("Pattern analysis task panicked")?;

    metrics.record("patterns", started.elapsed(), result.is_ok());
    Ok(result?)
}

async fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path))
}

/// Accepts either flat records or a list of snapshot objects
async fn read_snapshot_records(path: &str) -> Result<Vec<SnapshotRecord>> {
    let value: serde_json::Value = read_json(path).await?;
    snapshot_records_from_value(value).with_context(|| format!("Failed to parse snapshots in {}", path))
}

fn snapshot_records_from_value(value: serde_json::Value) -> Result<Vec<SnapshotRecord>> {
    let nested = value
        .as_array()
        .and_then(|items| items.first())
        .map_or(false, |first| first.get("holders").is_some());

    if nested {
        let snapshots: Vec<Snapshot> = serde_json::from_value(value)?;
        return Ok(snapshots.iter().flat_map(Snapshot::records).collect());
    }

    Ok(serde_json::from_value(value)?)
}

fn program_name(args: &[String]) -> &str {
    args.first().map_or("holder-lens", String::as_str)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn write_metrics(output_dir: &Path, metrics: &AnalysisMetrics) {
    let path: PathBuf = output_dir.join("metrics.prom");
    let write = async {
        tokio::fs::create_dir_all(output_dir).await?;
        tokio::fs::write(&path, metrics.render()).await
    };

    match write.await {
        Ok(()) => tracing::info!("Metrics written to {}", path.display()),
        Err(e) => tracing::warn!("Failed to write metrics to {}: {}", path.display(), e),
    }
}
