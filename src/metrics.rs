//! Regression accuracy metrics.
//!
//! Each metric is an independent pure function over two equal-length,
//! non-empty sequences. [`MetricsEngine`] evaluates a configured list of them
//! into a [`MetricReport`].

use crate::error::{EvalError, Result, ShapeMismatch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Regression metrics known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Root mean squared error
    #[default]
    Rmse,
    /// Mean squared error
    Mse,
    /// Mean absolute error
    Mae,
    /// Coefficient of determination
    R2,
}

impl MetricKind {
    /// Name used as the report key and baseline column header
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Rmse => "rmse",
            MetricKind::Mse => "mse",
            MetricKind::Mae => "mae",
            MetricKind::R2 => "r2",
        }
    }

    /// Evaluate this metric
    pub fn compute(&self, predictions: &[f64], labels: &[f64]) -> Result<f64> {
        match self {
            MetricKind::Rmse => compute_rmse(predictions, labels),
            MetricKind::Mse => compute_mse(predictions, labels),
            MetricKind::Mae => compute_mae(predictions, labels),
            MetricKind::R2 => compute_r2(predictions, labels),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metric name to value, ordered by name
pub type MetricReport = BTreeMap<String, f64>;

/// Computes a configured set of metrics
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    kinds: Vec<MetricKind>,
}

impl MetricsEngine {
    pub fn new(kinds: Vec<MetricKind>) -> Self {
        Self { kinds }
    }

    /// Evaluate every configured metric
    pub fn compute(&self, predictions: &[f64], labels: &[f64]) -> Result<MetricReport> {
        let mut report = MetricReport::new();
        for kind in &self.kinds {
            let value = kind.compute(predictions, labels)?;
            debug!(metric = %kind, value, "Metric computed");
            report.insert(kind.name().to_string(), value);
        }
        Ok(report)
    }
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(vec![MetricKind::Rmse])
    }
}

fn check_inputs(predictions: &[f64], labels: &[f64]) -> Result<()> {
    if labels.is_empty() {
        return Err(EvalError::empty("labels"));
    }
    if predictions.is_empty() {
        return Err(EvalError::empty("predictions"));
    }
    if predictions.len() != labels.len() {
        return Err(ShapeMismatch::Length {
            what: "predictions vs labels",
            expected: labels.len(),
            actual: predictions.len(),
        }
        .into());
    }
    Ok(())
}

/// Sum of squared residuals as `scale^2 * ssq`.
///
/// Residuals are divided by the running maximum magnitude before squaring,
/// so the accumulator stays in `[1, n]` and cannot overflow.
fn scaled_sum_of_squares(predictions: &[f64], labels: &[f64]) -> (f64, f64) {
    let mut scale = 0.0_f64;
    let mut ssq = 1.0_f64;
    for (&p, &l) in predictions.iter().zip(labels) {
        let residual = (p - l).abs();
        if residual == 0.0 {
            continue;
        }
        if scale < residual {
            ssq = 1.0 + ssq * (scale / residual).powi(2);
            scale = residual;
        } else {
            ssq += (residual / scale).powi(2);
        }
    }
    (scale, ssq)
}

/// Root mean squared error: `sqrt(mean((p - l)^2))`
pub fn compute_rmse(predictions: &[f64], labels: &[f64]) -> Result<f64> {
    check_inputs(predictions, labels)?;
    let (scale, ssq) = scaled_sum_of_squares(predictions, labels);
    if scale == 0.0 {
        return Ok(0.0);
    }
    Ok(scale * (ssq / labels.len() as f64).sqrt())
}

/// Mean squared error: `mean((p - l)^2)`
pub fn compute_mse(predictions: &[f64], labels: &[f64]) -> Result<f64> {
    let rmse = compute_rmse(predictions, labels)?;
    Ok(rmse * rmse)
}

/// Mean absolute error: `mean(|p - l|)`
pub fn compute_mae(predictions: &[f64], labels: &[f64]) -> Result<f64> {
    check_inputs(predictions, labels)?;
    let n = labels.len() as f64;
    // Dividing each term keeps the running sum bounded by max |p - l|.
    let mae = predictions
        .iter()
        .zip(labels)
        .fold(0.0_f64, |acc, (&p, &l)| acc + (p - l).abs() / n);
    Ok(mae)
}

/// Coefficient of determination: `1 - SS_res / SS_tot`
pub fn compute_r2(predictions: &[f64], labels: &[f64]) -> Result<f64> {
    check_inputs(predictions, labels)?;
    let n = labels.len() as f64;
    let mean = labels.iter().map(|&l| l / n).sum::<f64>();

    let (res_scale, res_ssq) = scaled_sum_of_squares(predictions, labels);
    let centered = vec![mean; labels.len()];
    let (tot_scale, tot_ssq) = scaled_sum_of_squares(labels, &centered);

    if tot_scale == 0.0 {
        return Err(EvalError::Degenerate {
            metric: "r2",
            reason: "labels are constant".to_string(),
        });
    }
    if res_scale == 0.0 {
        return Ok(1.0);
    }
    let ratio = (res_scale / tot_scale).powi(2) * (res_ssq / tot_ssq);
    Ok(1.0 - ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn naive_rmse(p: &[f64], l: &[f64]) -> f64 {
        let sum: f64 = p.iter().zip(l).map(|(a, b)| (a - b).powi(2)).sum();
        (sum / p.len() as f64).sqrt()
    }

    #[test]
    fn test_rmse_scenario() {
        let rmse = compute_rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]).unwrap();
        assert_relative_eq!(rmse, (1.0_f64 / 3.0).sqrt(), max_relative = 1e-12);
        assert!((rmse - 0.57735).abs() < 1e-5);
    }

    #[test]
    fn test_rmse_matches_definition() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let n = rng.gen_range(1..200);
            let p: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e3..1e3)).collect();
            let l: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e3..1e3)).collect();
            assert_relative_eq!(
                compute_rmse(&p, &l).unwrap(),
                naive_rmse(&p, &l),
                max_relative = 1e-10
            );
        }
    }

    #[test]
    fn test_rmse_of_identical_sequences_is_zero() {
        let mut rng = StdRng::seed_from_u64(11);
        let p: Vec<f64> = (0..64).map(|_| rng.gen_range(-50.0..50.0)).collect();
        assert_eq!(compute_rmse(&p, &p).unwrap(), 0.0);
    }

    #[test]
    fn test_rmse_does_not_overflow() {
        let p = [1e200, -1e200, 3e200];
        let l = [0.0, 0.0, 0.0];
        let rmse = compute_rmse(&p, &l).unwrap();
        assert!(rmse.is_finite());
        assert_relative_eq!(rmse, (11.0_f64 / 3.0).sqrt() * 1e200, max_relative = 1e-12);
    }

    #[test]
    fn test_empty_labels_rejected() {
        let err = compute_rmse(&[], &[]).unwrap_err();
        assert!(matches!(err, EvalError::EmptyInput { .. }));

        let err = compute_rmse(&[1.0], &[]).unwrap_err();
        assert!(matches!(err, EvalError::EmptyInput { .. }));
    }

    #[test]
    fn test_length_mismatch_is_shape_error() {
        let err = compute_rmse(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            EvalError::ShapeMismatch(ShapeMismatch::Length {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_mse_mae_r2() {
        let p = [2.5, 0.0, 2.0, 8.0];
        let l = [3.0, -0.5, 2.0, 7.0];

        assert_relative_eq!(compute_mse(&p, &l).unwrap(), 0.375, max_relative = 1e-12);
        assert_relative_eq!(compute_mae(&p, &l).unwrap(), 0.5, max_relative = 1e-12);
        assert_relative_eq!(
            compute_r2(&p, &l).unwrap(),
            0.948_608_137_044_967_9,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_r2_undefined_for_constant_labels() {
        let err = compute_r2(&[1.0, 2.0], &[3.0, 3.0]).unwrap_err();
        assert!(matches!(err, EvalError::Degenerate { metric: "r2", .. }));
    }

    #[test]
    fn test_engine_computes_configured_metrics() {
        let engine = MetricsEngine::new(vec![MetricKind::Rmse, MetricKind::Mae]);
        let report = engine.compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]).unwrap();

        assert_eq!(report.len(), 2);
        assert!((report["rmse"] - 0.57735).abs() < 1e-5);
        assert_relative_eq!(report["mae"], 1.0 / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn test_metric_kind_deserializes_lowercase() {
        let kinds: Vec<MetricKind> = serde_json::from_str(r#"["rmse","r2"]"#).unwrap();
        assert_eq!(kinds, vec![MetricKind::Rmse, MetricKind::R2]);
    }
}
