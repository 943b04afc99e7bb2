//! Model Evaluation Pipeline Library
//!
//! Batch evaluation of a trained regression model against a held-out test
//! set. A run unpacks the model artifact, scores the feature matrix, computes
//! accuracy metrics and writes two artifacts: an `evaluation.json` report and
//! a prediction baseline table for later model-quality monitoring.

pub mod baseline;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod types;

pub use baseline::{BaselineWriter, RoundingPolicy};
pub use config::AppConfig;
pub use dataset::EvaluationDataset;
pub use error::{EvalError, Result, ShapeMismatch};
pub use metrics::{compute_rmse, MetricKind, MetricReport, MetricsEngine};
pub use models::{ModelLoader, Predictor};
pub use pipeline::Pipeline;
pub use report::ReportWriter;
pub use types::{EvaluationReport, EvaluationSummary};
