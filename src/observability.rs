//! Observability module - structured logging and analysis metrics
//!
//! - `tracing` subscriber with an `EnvFilter` (RUST_LOG wins over the configured level)
//! - Prometheus counters and histograms for analysis runs
//!
//! # Usage
//! ```no_run
//! use holder_lens::observability::{init_observability, AnalysisMetrics, ObservabilityConfig};
//! use std::time::Duration;
//!
//! init_observability(ObservabilityConfig::default()).expect("Failed to initialize logging");
//!
//! let metrics = AnalysisMetrics::new().unwrap();
//! metrics.record("clusters", Duration::from_millis(12), true);
//! println!("{}", metrics.render());
//! ```

use anyhow::{Context, Result};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configuration for logging
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Fallback filter when RUST_LOG is unset (e.g. "info", "holder_lens=debug")
    pub log_level: String,
    /// Include file and line in log lines
    pub with_source_location: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "holder-lens".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: std::env::var("HOLDER_LENS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            with_source_location: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_observability(config: ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.with_source_location)
        .with_line_number(config.with_source_location);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        "Observability initialized: service={}, version={}",
        config.service_name,
        config.service_version
    );
    Ok(())
}

/// Prometheus metrics for analysis runs, kept in a private registry
#[derive(Clone)]
pub struct AnalysisMetrics {
    registry: Registry,
    runs: IntCounterVec,
    failures: IntCounterVec,
    duration: HistogramVec,
}

impl AnalysisMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let runs = IntCounterVec::new(
            Opts::new("holder_lens_analysis_runs_total", "Analysis runs by pipeline"),
            &["pipeline"],
        )?;
        let failures = IntCounterVec::new(
            Opts::new(
                "holder_lens_analysis_failures_total",
                "Failed analysis runs by pipeline",
            ),
            &["pipeline"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "holder_lens_analysis_duration_seconds",
                "Analysis wall time by pipeline",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["pipeline"],
        )?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            runs,
            failures,
            duration,
        })
    }

    /// Record one finished run
    pub fn record(&self, pipeline: &str, elapsed: Duration, success: bool) {
        self.runs.with_label_values(&[pipeline]).inc();
        if !success {
            self.failures.with_label_values(&[pipeline]).inc();
        }
        self.duration
            .with_label_values(&[pipeline])
            .observe(elapsed.as_secs_f64());
    }

    /// Metrics in the Prometheus text exposition format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}
