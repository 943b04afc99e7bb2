//! Configuration management for the evaluation pipeline

use crate::baseline::RoundingPolicy;
use crate::metrics::MetricKind;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Serialized model format stored inside the artifact
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// XGBoost JSON model
    #[default]
    Xgboost,
    /// ONNX graph, requires the `onnx` feature
    Onnx,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Compressed model artifact
    pub model_archive: PathBuf,
    /// Headerless numeric feature matrix
    pub features: PathBuf,
    /// Headerless single-column labels
    pub labels: PathBuf,
    /// Destination directory for `evaluation.json`
    pub report_dir: PathBuf,
    /// Destination directory for the prediction baseline
    pub baseline_dir: PathBuf,
    /// Parent directory for the extraction scratch space (system temp if unset)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub format: ModelFormat,
    /// Name of the model entry inside the archive
    #[serde(default = "default_model_file_name")]
    pub file_name: String,
    /// Expected feature count, required for ONNX models
    #[serde(default)]
    pub num_features: Option<usize>,
    /// Number of intra-op threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_model_file_name() -> String {
    "xgboost-model".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            format: ModelFormat::Xgboost,
            file_name: default_model_file_name(),
            num_features: None,
            onnx_threads: default_onnx_threads(),
        }
    }
}

/// Metric and baseline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Metrics written to the report
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricKind>,
    /// Metric broadcast into every baseline row
    #[serde(default)]
    pub baseline_metric: MetricKind,
    /// How predictions are written to the baseline
    #[serde(default)]
    pub rounding: RoundingPolicy,
    /// Create `baseline_dir` before inference instead of requiring it to exist
    #[serde(default = "default_create_baseline_dir")]
    pub create_baseline_dir: bool,
}

fn default_metrics() -> Vec<MetricKind> {
    vec![MetricKind::Rmse]
}

fn default_create_baseline_dir() -> bool {
    true
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            baseline_metric: MetricKind::Rmse,
            rounding: RoundingPolicy::NearestInteger,
            create_baseline_dir: default_create_baseline_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Environment variable prefix for overrides, e.g. `MODEL_EVAL__PATHS__REPORT_DIR`
    pub const ENV_PREFIX: &'static str = "MODEL_EVAL";

    /// Load configuration from a specific path, with environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration with default model/evaluation settings for the given paths
    pub fn with_paths(paths: PathsConfig) -> Self {
        Self {
            paths,
            model: ModelConfig::default(),
            evaluation: EvaluationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.evaluation.metrics.is_empty() {
            anyhow::bail!("evaluation.metrics must name at least one metric");
        }
        if self.model.file_name.trim().is_empty() {
            anyhow::bail!("model.file_name must not be empty");
        }
        if self.model.format == ModelFormat::Onnx && self.model.num_features.is_none() {
            anyhow::bail!("model.num_features is required for onnx models");
        }
        Ok(())
    }
}
