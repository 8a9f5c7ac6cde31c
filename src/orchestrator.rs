//! Orchestrator configuration for holder-lens
//!
//! Loads the TOML configuration for both pipelines, applies environment
//! overrides and validates thresholds before any analysis runs.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analytics::{ClusterAnalyzerConfig, HolderPatternConfig};
use crate::observability::ObservabilityConfig;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    /// Where renderings and metrics are written
    pub output_dir: PathBuf,
    pub enable_metrics: bool,
    pub cluster: ClusterAnalyzerConfig,
    pub holder_patterns: HolderPatternConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            output_dir: PathBuf::from("./output"),
            enable_metrics: true,
            cluster: ClusterAnalyzerConfig::default(),
            holder_patterns: HolderPatternConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override output location and log level from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("HOLDER_LENS_OUTPUT_DIR") {
            if !dir.is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(level) = std::env::var("HOLDER_LENS_LOG_LEVEL") {
            if !level.is_empty() {
                self.log_level = level;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let patterns = &self.holder_patterns;
        if patterns.top_n == 0 {
            bail!("holder_patterns.top_n must be positive");
        }
        if patterns.min_snapshots == 0 {
            bail!("holder_patterns.min_snapshots must be positive");
        }
        if patterns.churner_high_confidence_volatility < patterns.churner_min_rank_volatility {
            bail!(
                "holder_patterns.churner_high_confidence_volatility ({}) is below churner_min_rank_volatility ({})",
                patterns.churner_high_confidence_volatility,
                patterns.churner_min_rank_volatility
            );
        }

        let cluster = &self.cluster;
        if !cluster.min_transfer_amount.is_finite() || cluster.min_transfer_amount < 0.0 {
            bail!(
                "cluster.min_transfer_amount must be a non-negative number, got {}",
                cluster.min_transfer_amount
            );
        }

        Ok(())
    }

    pub fn observability(&self) -> ObservabilityConfig {
        ObservabilityConfig {
            log_level: self.log_level.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            log_level = "debug"

            [holder_patterns]
            top_n = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.holder_patterns.top_n, 50);
        assert_eq!(config.holder_patterns.min_snapshots, 3);
        assert_eq!(config.cluster, ClusterAnalyzerConfig::default());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.holder_patterns.top_n = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.cluster.min_transfer_amount = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.holder_patterns.churner_high_confidence_volatility = 10;
        assert!(config.validate().is_err());
    }
}
