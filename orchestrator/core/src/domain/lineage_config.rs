// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Lineage Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) holding:
// - Feedback loop defaults and thresholds
// - Improvement analyzer detection thresholds
// - Storage backend selection

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::feedback::{FeedbackType, TimeWindow};
use crate::domain::feedback_loop::FeedbackLoopRequest;
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "LineageConfig";

/// Top-level lineage configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "LineageConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: LineageConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineageConfigSpec {
    #[serde(default)]
    pub feedback_loop: FeedbackLoopConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackLoopConfig {
    /// Minimum confidence for automatic application
    #[serde(default = "default_auto_apply_threshold")]
    pub auto_apply_threshold: f64,

    /// Minimum feedback items (and per-arm samples) before testing
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,

    #[serde(default = "default_significance_level")]
    pub significance_level: f64,

    #[serde(default = "default_true")]
    pub enable_ab_testing: bool,

    /// Divide the significance level by the number of proposals in a run
    #[serde(default = "default_true")]
    pub bonferroni_correction: bool,

    /// Relative effect above which an untested or non-significant proposal
    /// is routed to manual review instead of rejected
    #[serde(default = "default_min_effect_size")]
    pub min_effect_size: f64,

    #[serde(default = "default_validation_timeout", with = "humantime_serde")]
    pub validation_timeout: Duration,

    #[serde(default = "default_tracking_retry_backoff", with = "humantime_serde")]
    pub tracking_retry_backoff: Duration,

    /// Window used when a run does not specify one
    #[serde(default = "default_time_window", with = "humantime_serde")]
    pub default_time_window: Duration,
}

impl Default for FeedbackLoopConfig {
    fn default() -> Self {
        Self {
            auto_apply_threshold: default_auto_apply_threshold(),
            min_sample_size: default_min_sample_size(),
            significance_level: default_significance_level(),
            enable_ab_testing: true,
            bonferroni_correction: true,
            min_effect_size: default_min_effect_size(),
            validation_timeout: default_validation_timeout(),
            tracking_retry_backoff: default_tracking_retry_backoff(),
            default_time_window: default_time_window(),
        }
    }
}

impl FeedbackLoopConfig {
    /// Request for `pattern_id` over the configured default window
    pub fn request_for(&self, pattern_id: impl Into<String>) -> FeedbackLoopRequest {
        let window = chrono::Duration::from_std(self.default_time_window)
            .unwrap_or_else(|_| chrono::Duration::days(7));
        FeedbackLoopRequest {
            pattern_id: pattern_id.into(),
            feedback_type: FeedbackType::All,
            time_window: TimeWindow::last(window),
            auto_apply_threshold: self.auto_apply_threshold,
            min_sample_size: self.min_sample_size,
            significance_level: self.significance_level,
            enable_ab_testing: self.enable_ab_testing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Oldest share of the window used as the historical baseline
    #[serde(default = "default_baseline_fraction")]
    pub baseline_fraction: f64,

    /// Relative p50 duration change that counts as a trend
    #[serde(default = "default_performance_threshold")]
    pub performance_threshold: f64,

    /// Absolute drop in mean quality score
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Absolute rise in failure rate
    #[serde(default = "default_reliability_threshold")]
    pub reliability_threshold: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            baseline_fraction: default_baseline_fraction(),
            performance_threshold: default_performance_threshold(),
            quality_threshold: default_quality_threshold(),
            reliability_threshold: default_reliability_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    /// Required for the postgres backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl StorageConfig {
    pub fn backend(&self) -> Result<StorageBackend, ConfigError> {
        match self.backend {
            StorageKind::InMemory => Ok(StorageBackend::InMemory),
            StorageKind::Postgres => match &self.database_url {
                Some(url) if !url.is_empty() => Ok(StorageBackend::PostgreSQL(PostgresConfig {
                    connection_string: url.clone(),
                })),
                _ => Err(ConfigError::Invalid(
                    "spec.storage.database_url is required for the postgres backend".to_string(),
                )),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_true() -> bool {
    true
}

fn default_auto_apply_threshold() -> f64 {
    0.95
}

fn default_min_sample_size() -> usize {
    30
}

fn default_significance_level() -> f64 {
    0.05
}

fn default_min_effect_size() -> f64 {
    0.05
}

fn default_validation_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_tracking_retry_backoff() -> Duration {
    Duration::from_millis(100)
}

fn default_time_window() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_baseline_fraction() -> f64 {
    0.5
}

fn default_performance_threshold() -> f64 {
    0.10
}

fn default_quality_threshold() -> f64 {
    0.05
}

fn default_reliability_threshold() -> f64 {
    0.05
}

impl Default for LineageConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "pattern-lineage".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: LineageConfigSpec::default(),
        }
    }
}

impl LineageConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. LINEAGE_CONFIG_PATH environment variable
    /// 2. ./lineage-config.yaml (working directory)
    /// 3. ~/.lineage/config.yaml (user home)
    /// 4. /etc/lineage/config.yaml (system, Unix) or C:\ProgramData\Lineage\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LINEAGE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./lineage-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".lineage").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/lineage/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Lineage\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LINEAGE_DATABASE_URL") {
            if !url.is_empty() {
                tracing::info!("Environment override: LINEAGE_DATABASE_URL");
                self.spec.storage.backend = StorageKind::Postgres;
                self.spec.storage.database_url = Some(url);
            }
        }

        if let Ok(val) = std::env::var("LINEAGE_AUTO_APPLY_THRESHOLD") {
            match val.parse::<f64>() {
                Ok(threshold) => {
                    tracing::info!("Environment override: LINEAGE_AUTO_APPLY_THRESHOLD={}", threshold);
                    self.spec.feedback_loop.auto_apply_threshold = threshold;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for LINEAGE_AUTO_APPLY_THRESHOLD: '{}'. Expected a number. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("LINEAGE_MIN_SAMPLE_SIZE") {
            match val.parse::<usize>() {
                Ok(size) => {
                    tracing::info!("Environment override: LINEAGE_MIN_SAMPLE_SIZE={}", size);
                    self.spec.feedback_loop.min_sample_size = size;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for LINEAGE_MIN_SAMPLE_SIZE: '{}'. Expected an integer. Ignoring.",
                    val
                ),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.api_version != API_VERSION {
            return invalid(format!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version, API_VERSION
            ));
        }
        if self.kind != KIND {
            return invalid(format!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND));
        }
        if self.metadata.name.is_empty() {
            return invalid("metadata.name cannot be empty".to_string());
        }

        let fl = &self.spec.feedback_loop;
        if !(fl.auto_apply_threshold > 0.0 && fl.auto_apply_threshold <= 1.0) {
            return invalid(format!(
                "spec.feedback_loop.auto_apply_threshold must be in (0, 1], got {}",
                fl.auto_apply_threshold
            ));
        }
        if !(fl.significance_level > 0.0 && fl.significance_level < 1.0) {
            return invalid(format!(
                "spec.feedback_loop.significance_level must be in (0, 1), got {}",
                fl.significance_level
            ));
        }
        if fl.min_sample_size < 2 {
            return invalid(format!(
                "spec.feedback_loop.min_sample_size must be at least 2, got {}",
                fl.min_sample_size
            ));
        }
        if !(fl.min_effect_size >= 0.0 && fl.min_effect_size.is_finite()) {
            return invalid(format!(
                "spec.feedback_loop.min_effect_size must be non-negative, got {}",
                fl.min_effect_size
            ));
        }
        if fl.validation_timeout.is_zero() {
            return invalid("spec.feedback_loop.validation_timeout must be positive".to_string());
        }

        let an = &self.spec.analyzer;
        if !(an.baseline_fraction > 0.0 && an.baseline_fraction < 1.0) {
            return invalid(format!(
                "spec.analyzer.baseline_fraction must be in (0, 1), got {}",
                an.baseline_fraction
            ));
        }
        for (name, value) in [
            ("performance_threshold", an.performance_threshold),
            ("quality_threshold", an.quality_threshold),
            ("reliability_threshold", an.reliability_threshold),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return invalid(format!("spec.analyzer.{} must be in (0, 1), got {}", name, value));
            }
        }

        self.spec.storage.backend()?;
        Ok(())
    }
}
