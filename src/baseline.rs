//! Prediction baseline writer.
//!
//! The baseline is the reference table later compared against live traffic
//! by model-quality monitoring. It holds one row per test sample with the
//! prediction, the run's metric value repeated on every row, and the label.

use crate::dataset::LabelKind;
use crate::error::{EvalError, Result, ShapeMismatch};
use crate::types::baseline::{BaselineRecord, NumberCell};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sub-directory of the baseline directory holding the table
pub const BASELINE_SUBDIR: &str = "prediction_baseline";

/// File name of the table
pub const BASELINE_FILE_NAME: &str = "prediction_baseline.csv";

/// How predictions are written to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Round to the nearest integer, ties to even
    #[default]
    NearestInteger,
    /// Write the prediction unchanged
    Raw,
}

impl RoundingPolicy {
    /// Convert one prediction into its baseline cell
    pub fn apply(&self, prediction: f64) -> std::result::Result<NumberCell, String> {
        match self {
            RoundingPolicy::Raw => Ok(NumberCell::Float(prediction)),
            RoundingPolicy::NearestInteger => {
                let rounded = prediction.round_ties_even();
                if !rounded.is_finite() || rounded.abs() >= i64::MAX as f64 {
                    return Err(format!("prediction {prediction} cannot be rounded to an integer"));
                }
                Ok(NumberCell::Integer(rounded as i64))
            }
        }
    }
}

/// Writes `prediction_baseline/prediction_baseline.csv` under an existing directory
#[derive(Debug, Clone)]
pub struct BaselineWriter {
    rounding: RoundingPolicy,
    /// Header of the broadcast metric column
    metric_name: String,
    /// Form of the label column
    label_kind: LabelKind,
}

impl BaselineWriter {
    pub fn new(rounding: RoundingPolicy, metric_name: impl Into<String>) -> Self {
        Self {
            rounding,
            metric_name: metric_name.into(),
            label_kind: LabelKind::Float,
        }
    }

    /// Write labels as integers when the label file held only integers
    pub fn with_label_kind(mut self, label_kind: LabelKind) -> Self {
        self.label_kind = label_kind;
        self
    }

    /// Location of the table under `output_dir`
    pub fn baseline_path<P: AsRef<Path>>(output_dir: P) -> PathBuf {
        output_dir
            .as_ref()
            .join(BASELINE_SUBDIR)
            .join(BASELINE_FILE_NAME)
    }

    /// Build the rows without touching the filesystem
    pub fn records(
        &self,
        predictions: &[f64],
        labels: &[f64],
        metric_value: f64,
    ) -> std::result::Result<Vec<BaselineRecord>, String> {
        predictions
            .iter()
            .zip(labels)
            .map(|(&p, &label)| {
                let label = match self.label_kind {
                    LabelKind::Integer => NumberCell::Integer(label as i64),
                    LabelKind::Float => NumberCell::Float(label),
                };
                Ok(BaselineRecord {
                    prediction: self.rounding.apply(p)?,
                    metric: metric_value,
                    label,
                })
            })
            .collect()
    }

    /// Write the table. `output_dir` must already exist.
    pub fn write<P: AsRef<Path>>(
        &self,
        predictions: &[f64],
        labels: &[f64],
        metric_value: f64,
        output_dir: P,
    ) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        let path = Self::baseline_path(output_dir);

        if predictions.len() != labels.len() {
            return Err(ShapeMismatch::Length {
                what: "baseline predictions vs labels",
                expected: labels.len(),
                actual: predictions.len(),
            }
            .into());
        }
        if !output_dir.is_dir() {
            return Err(EvalError::io(
                output_dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "baseline directory does not exist",
                ),
            ));
        }

        let records = self
            .records(predictions, labels, metric_value)
            .map_err(|reason| EvalError::invalid_data(&path, reason))?;

        let subdir = output_dir.join(BASELINE_SUBDIR);
        fs::create_dir_all(&subdir).map_err(|e| EvalError::io(&subdir, e))?;

        let csv_err = |e: csv::Error| EvalError::io(&path, e.into());
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(csv_err)?;
        writer
            .write_record(["prediction", self.metric_name.as_str(), "label"])
            .map_err(csv_err)?;
        for record in &records {
            writer.serialize(record).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| EvalError::io(&path, e))?;

        info!(
            path = %path.display(),
            rows = records.len(),
            rounding = ?self.rounding,
            "Prediction baseline written"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_baseline_table() {
        let dir = TempDir::new().unwrap();
        let writer = BaselineWriter::new(RoundingPolicy::NearestInteger, "rmse");

        let path = writer
            .write(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0], 0.5, dir.path())
            .unwrap();

        assert_eq!(
            path,
            dir.path()
                .join("prediction_baseline")
                .join("prediction_baseline.csv")
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "prediction,rmse,label\n1,0.5,1.0\n2,0.5,2.0\n3,0.5,4.0\n"
        );
    }

    #[test]
    fn test_integer_labels_keep_integer_form() {
        let dir = TempDir::new().unwrap();
        let writer = BaselineWriter::new(RoundingPolicy::NearestInteger, "rmse")
            .with_label_kind(LabelKind::Integer);

        let path = writer
            .write(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0], 0.5, dir.path())
            .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "prediction,rmse,label\n1,0.5,1\n2,0.5,2\n3,0.5,4\n"
        );
    }

    #[test]
    fn test_rounds_half_to_even() {
        let policy = RoundingPolicy::NearestInteger;
        assert_eq!(policy.apply(2.5).unwrap(), NumberCell::Integer(2));
        assert_eq!(policy.apply(3.5).unwrap(), NumberCell::Integer(4));
        assert_eq!(policy.apply(-0.6).unwrap(), NumberCell::Integer(-1));
        assert_eq!(policy.apply(1.49).unwrap(), NumberCell::Integer(1));
    }

    #[test]
    fn test_raw_policy_keeps_value() {
        let dir = TempDir::new().unwrap();
        let writer = BaselineWriter::new(RoundingPolicy::Raw, "rmse");

        let path = writer.write(&[1.25], &[1.0], 0.25, dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "prediction,rmse,label\n1.25,0.25,1.0\n"
        );
    }

    #[test]
    fn test_non_finite_prediction_rejected() {
        let dir = TempDir::new().unwrap();
        let writer = BaselineWriter::new(RoundingPolicy::NearestInteger, "rmse");

        let err = writer
            .write(&[f64::NAN], &[1.0], 0.5, dir.path())
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidData { .. }));
    }

    #[test]
    fn test_missing_output_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("output");
        let writer = BaselineWriter::new(RoundingPolicy::NearestInteger, "rmse");

        let err = writer.write(&[1.0], &[1.0], 0.0, &missing).unwrap_err();
        assert!(matches!(err, EvalError::Io { .. }));
        assert!(!missing.exists());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let writer = BaselineWriter::new(RoundingPolicy::NearestInteger, "rmse");

        let err = writer.write(&[1.0, 2.0], &[1.0], 0.0, dir.path()).unwrap_err();
        assert!(matches!(err, EvalError::ShapeMismatch(_)));
    }

    #[test]
    fn test_metric_column_named_after_metric() {
        let dir = TempDir::new().unwrap();
        let writer = BaselineWriter::new(RoundingPolicy::NearestInteger, "mae");

        let path = writer.write(&[1.0], &[1.0], 0.0, dir.path()).unwrap();
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("prediction,mae,label\n"));
    }
}
