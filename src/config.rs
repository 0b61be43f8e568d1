// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the append upload service.
//!
//! Defaults mirror the limits of the legacy upload endpoint: a 100 second
//! upload interval, 1000 byte payloads and 20 byte file names.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration for the append upload service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Upload throttling configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Submission validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Upload throttling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum seconds between two accepted uploads (default: 100)
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// File holding the last accepted upload time (default: ptime.txt)
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

/// Validation configuration for upload submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Pre-shared upload key. Must be non-empty.
    #[serde(default)]
    pub shared_key: String,

    /// Maximum payload size in bytes (default: 1000)
    #[serde(default = "default_max_data_bytes")]
    pub max_data_bytes: usize,

    /// Maximum file name length in bytes (default: 20)
    #[serde(default = "default_max_name_bytes")]
    pub max_name_bytes: usize,

    /// Optional allow-list; when set, file names must fully match it.
    #[serde(default)]
    pub allowed_name_pattern: Option<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving appended files (default: data)
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

/// Configuration rejected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Upload key must not be empty")]
    EmptySharedKey,

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("min_interval_secs out of range: {0}")]
    IntervalOutOfRange(u64),

    #[error("Invalid allowed file name pattern: {0}")]
    InvalidNamePattern(#[from] regex::Error),

    #[error("Metrics path must start with '/': {0}")]
    InvalidMetricsPath(String),
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_min_interval_secs() -> u64 {
    100
}

fn default_state_path() -> PathBuf {
    PathBuf::from("ptime.txt")
}

fn default_max_data_bytes() -> usize {
    1000
}

fn default_max_name_bytes() -> usize {
    20
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            storage: StorageConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            state_path: default_state_path(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            shared_key: String::new(),
            max_data_bytes: default_max_data_bytes(),
            max_name_bytes: default_max_name_bytes(),
            allowed_name_pattern: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validation.validate()?;
        if self.rate_limit.min_interval_secs == 0 {
            return Err(ConfigError::ZeroLimit("min_interval_secs"));
        }
        if i64::try_from(self.rate_limit.min_interval_secs).is_err() {
            return Err(ConfigError::IntervalOutOfRange(
                self.rate_limit.min_interval_secs,
            ));
        }
        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
        }
        Ok(())
    }
}

impl ValidationConfig {
    /// Check the key and limits, and that the allow-list compiles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared_key.is_empty() {
            return Err(ConfigError::EmptySharedKey);
        }
        if self.max_data_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_data_bytes"));
        }
        if self.max_name_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_name_bytes"));
        }
        if let Some(pattern) = &self.allowed_name_pattern {
            Regex::new(pattern)?;
        }
        Ok(())
    }

    /// Upper bound for a raw request body carrying a valid submission.
    ///
    /// Form encoding can triple a payload, so the cap leaves headroom and the
    /// exact size check happens after decoding.
    pub fn body_limit(&self) -> usize {
        self.max_data_bytes
            .saturating_mul(4)
            .saturating_add(self.max_name_bytes.saturating_mul(3))
            .saturating_add(4096)
    }
}
