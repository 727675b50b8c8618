//! Sync tunables: debounce window, retry budget and retry delay.
//!
//! Defaults are conservative enough for slow disks (500 ms debounce,
//! 3 retries, 100 ms apart). A YAML file can override any subset of fields;
//! a missing file falls back to defaults, a malformed one is an error.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fs;

fn default_debounce_ms() -> u64 {
    500
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

/// Tunables for the reload and watch machinery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long external file changes must settle before a reload fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Retries after a failed read before the engine gives up.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Delay between read retries.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl SyncConfig {
    /// Load from a YAML file, falling back to defaults when the file does
    /// not exist.
    pub fn load_or_default<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("sync config not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sync config: {path}"))?;
        let config: Self = serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("Failed to parse sync config: {path}"))?;

        tracing::info!("Loaded sync config from {}", path);
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save<P: AsRef<Utf8Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml =
            serde_yaml_ng::to_string(self).context("Failed to serialize sync config to YAML")?;
        fs::write(path, yaml).with_context(|| format!("Failed to write sync config: {path}"))?;
        Ok(())
    }
}
