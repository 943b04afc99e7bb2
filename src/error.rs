//! Error taxonomy for the evaluation pipeline.
//!
//! Every failure aborts the run. Variants carry the offending path or the
//! expected/actual dimensions so a failed run can be diagnosed from the
//! message alone.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors raised by the evaluation pipeline.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The model archive is unreadable or incomplete.
    #[error("model artifact {} is corrupt: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// The model file could not be deserialized into a predictor.
    #[error("failed to load model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// The loaded model failed while scoring the feature matrix.
    #[error("inference failed for model {}: {reason}", path.display())]
    Inference { path: PathBuf, reason: String },

    /// Feature, label or prediction dimensions disagree.
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),

    /// A dataset or sequence has zero rows.
    #[error("empty input: {what} has no rows")]
    EmptyInput { what: String },

    /// A value could not be parsed or is not usable.
    #[error("invalid data in {}: {reason}", path.display())]
    InvalidData { path: PathBuf, reason: String },

    /// A metric is undefined for the given input.
    #[error("metric {metric} is undefined: {reason}")]
    Degenerate {
        metric: &'static str,
        reason: String,
    },

    /// Filesystem read or write failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Dimension mismatches between the model, the dataset and the predictions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeMismatch {
    /// Feature matrix width differs from the model's trained feature count.
    #[error("feature width mismatch: model expects {expected} columns, got {actual}")]
    FeatureWidth { expected: usize, actual: usize },

    /// Two sequences that must be paired element-wise differ in length.
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    Length {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The label file does not hold exactly one column.
    #[error("label file must have {expected} column, got {actual}")]
    LabelColumns { expected: usize, actual: usize },

    /// The inference backend returned the wrong number of outputs.
    #[error("model produced {actual} predictions for {expected} rows")]
    PredictionCount { expected: usize, actual: usize },
}

impl EvalError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::ArtifactCorrupt {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn model_load(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    #[cfg_attr(not(feature = "onnx"), allow(dead_code))]
    pub(crate) fn inference(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Inference {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_data(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn empty(what: impl Into<String>) -> Self {
        Self::EmptyInput { what: what.into() }
    }
}
