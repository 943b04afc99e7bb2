//! Evaluation report document

use crate::metrics::MetricReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single metric entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
}

/// `{"regression_metrics": {"<metric>": {"value": <float>}}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub regression_metrics: BTreeMap<String, MetricValue>,
}

impl EvaluationReport {
    pub fn from_metrics(metrics: &MetricReport) -> Self {
        Self {
            regression_metrics: metrics
                .iter()
                .map(|(name, &value)| (name.clone(), MetricValue { value }))
                .collect(),
        }
    }

    /// Value of a named metric, if present
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.regression_metrics.get(name).map(|m| m.value)
    }

    pub fn to_metrics(&self) -> MetricReport {
        self.regression_metrics
            .iter()
            .map(|(name, m)| (name.clone(), m.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_schema() {
        let mut metrics = MetricReport::new();
        metrics.insert("rmse".to_string(), 0.5);

        let json = serde_json::to_string(&EvaluationReport::from_metrics(&metrics)).unwrap();
        assert_eq!(json, r#"{"regression_metrics":{"rmse":{"value":0.5}}}"#);
    }

    #[test]
    fn test_report_parses_python_style_output() {
        let json = r#"{"regression_metrics": {"rmse": {"value": 0.5773502691896257}}}"#;
        let report: EvaluationReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.metric("rmse"), Some(0.5773502691896257));
        assert_eq!(report.metric("mae"), None);
        assert_eq!(report.to_metrics().len(), 1);
    }
}
