//! Outcome of a completed evaluation run

use crate::metrics::MetricReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Returned by the pipeline once both artifacts are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Unique run identifier, also attached to every log line of the run
    pub run_id: Uuid,

    /// Run start timestamp
    pub started_at: DateTime<Utc>,

    /// Timestamp after the baseline was written
    pub finished_at: DateTime<Utc>,

    /// Backend that produced the predictions
    pub model: String,

    /// Number of evaluated samples
    pub rows: usize,

    /// Computed metrics by name
    pub metrics: MetricReport,

    /// Written `evaluation.json`
    pub report_path: PathBuf,

    /// Written baseline CSV
    pub baseline_path: PathBuf,
}

impl EvaluationSummary {
    /// Wall-clock duration of the run in milliseconds
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_summary_serialization() {
        let started_at = Utc::now();
        let mut metrics = MetricReport::new();
        metrics.insert("rmse".to_string(), 0.57735);

        let summary = EvaluationSummary {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at + Duration::milliseconds(1500),
            model: "xgboost".to_string(),
            rows: 3,
            metrics,
            report_path: "evaluation/evaluation.json".into(),
            baseline_path: "output/prediction_baseline/prediction_baseline.csv".into(),
        };

        let json = serde_json::to_string(&summary).unwrap();
        let deserialized: EvaluationSummary = serde_json::from_str(&json).unwrap();

        assert_eq!(summary.run_id, deserialized.run_id);
        assert_eq!(summary.metrics, deserialized.metrics);
        assert_eq!(deserialized.elapsed_ms(), 1500);
    }
}
