//! Evaluation report writer

use crate::error::{EvalError, Result};
use crate::metrics::MetricReport;
use crate::types::report::EvaluationReport;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the report inside the report directory
pub const REPORT_FILE_NAME: &str = "evaluation.json";

/// Serializes metrics into `evaluation.json`
#[derive(Debug, Clone, Default)]
pub struct ReportWriter;

impl ReportWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write the report, creating `output_dir` if needed and replacing any previous report
    pub fn write<P: AsRef<Path>>(&self, metrics: &MetricReport, output_dir: P) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        let path = output_dir.join(REPORT_FILE_NAME);

        if let Some((name, value)) = metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EvalError::invalid_data(
                &path,
                format!("metric {name} is not finite ({value})"),
            ));
        }

        fs::create_dir_all(output_dir).map_err(|e| EvalError::io(output_dir, e))?;

        let document = EvaluationReport::from_metrics(metrics);
        let json = serde_json::to_string(&document)
            .map_err(|e| EvalError::invalid_data(&path, e.to_string()))?;
        fs::write(&path, json).map_err(|e| EvalError::io(&path, e))?;

        info!(path = %path.display(), metrics = ?metrics, "Evaluation report written");
        Ok(path)
    }

    /// Parse a previously written report
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<EvaluationReport> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| EvalError::invalid_data(path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn rmse_report(value: f64) -> MetricReport {
        let mut metrics = MetricReport::new();
        metrics.insert("rmse".to_string(), value);
        metrics
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let rmse = (1.0_f64 / 3.0).sqrt();
        let writer = ReportWriter::new();

        let path = writer.write(&rmse_report(rmse), dir.path()).unwrap();
        let report = writer.read(&path).unwrap();

        assert_relative_eq!(report.metric("rmse").unwrap(), rmse, max_relative = 1e-15);
    }

    #[test]
    fn test_creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("a").join("b");

        let path = ReportWriter::new()
            .write(&rmse_report(1.0), &output)
            .unwrap();
        assert_eq!(path, output.join("evaluation.json"));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"{"regression_metrics":{"rmse":{"value":1.0}}}"#
        );
    }

    #[test]
    fn test_overwrites_previous_report() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new();

        writer.write(&rmse_report(2.0), dir.path()).unwrap();
        let path = writer.write(&rmse_report(0.5), dir.path()).unwrap();

        assert_eq!(writer.read(&path).unwrap().metric("rmse"), Some(0.5));
    }

    #[test]
    fn test_rejects_non_finite_metric() {
        let dir = TempDir::new().unwrap();
        let err = ReportWriter::new()
            .write(&rmse_report(f64::NAN), dir.path())
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidData { .. }));
        assert!(!dir.path().join(REPORT_FILE_NAME).exists());
    }

    #[test]
    fn test_unwritable_destination_is_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let err = ReportWriter::new()
            .write(&rmse_report(1.0), &blocker)
            .unwrap_err();
        assert!(matches!(err, EvalError::Io { .. }));
    }
}
