use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level merge engine configuration (`shardmerge.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub merge: MergeSectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[merge]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSectionConfig {
    /// Upper bound on rows buffered in memory across all shards for one merge
    /// (0 = unlimited).
    pub max_rows_buffered: usize,
    /// Fraction digits of a recomputed `AVG(DISTINCT x)` over decimal input.
    pub avg_decimal_scale: u8,
    /// Drain shard cursors on one worker thread per shard.
    pub parallel_drain: bool,
    /// Shards whose drain takes longer than this are logged at WARN.
    pub slow_shard_warn_ms: u64,
}

impl Default for MergeSectionConfig {
    fn default() -> Self {
        Self {
            max_rows_buffered: 1_000_000,
            avg_decimal_scale: 4,
            parallel_drain: true,
            slow_shard_warn_ms: 1000,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,shard_merge=debug".to_string(),
        }
    }
}

impl MergeConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded merge config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: MergeConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // i128 mantissas hold 38 digits; leave room for the integral part of an average.
        if self.merge.avg_decimal_scale > 18 {
            return Err(ConfigError::Invalid(format!(
                "merge.avg_decimal_scale must be <= 18, got {}",
                self.merge.avg_decimal_scale
            )));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must not be empty".into()));
        }
        Ok(())
    }
}
