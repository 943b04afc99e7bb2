//! Batch inference interface shared by all model backends

use crate::dataset::FeatureMatrix;
use crate::error::{Result, ShapeMismatch};
use ndarray::{Array1, ArrayView2};

/// One prediction per feature-matrix row
pub type Prediction = Array1<f64>;

/// A deserialized model able to score a feature matrix.
///
/// Implementations are deterministic: the same matrix and model state always
/// yield the same predictions.
pub trait Predictor: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Number of feature columns the model was trained on
    fn num_features(&self) -> usize;

    /// Score rows whose width has already been checked
    fn predict_rows(&self, features: ArrayView2<'_, f64>) -> Result<Prediction>;

    /// Score every row of `features`
    fn predict(&self, features: &FeatureMatrix) -> Result<Prediction> {
        check_width(self.num_features(), features.ncols())?;
        let predictions = self.predict_rows(features.view())?;
        if predictions.len() != features.nrows() {
            return Err(ShapeMismatch::PredictionCount {
                expected: features.nrows(),
                actual: predictions.len(),
            }
            .into());
        }
        Ok(predictions)
    }
}

/// Fail unless the matrix width equals the trained feature count
pub fn check_width(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ShapeMismatch::FeatureWidth { expected, actual }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use ndarray::array;

    /// Returns the first column unchanged
    struct Passthrough;

    impl Predictor for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }

        fn num_features(&self) -> usize {
            1
        }

        fn predict_rows(&self, features: ArrayView2<'_, f64>) -> Result<Prediction> {
            Ok(features.column(0).to_owned())
        }
    }

    #[test]
    fn test_predict_checks_width() {
        let err = Passthrough.predict(&array![[1.0, 2.0]]).unwrap_err();
        assert!(matches!(
            err,
            EvalError::ShapeMismatch(ShapeMismatch::FeatureWidth {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_predict_returns_one_value_per_row() {
        let predictions = Passthrough.predict(&array![[1.0], [2.0], [3.0]]).unwrap();
        assert_eq!(predictions.to_vec(), vec![1.0, 2.0, 3.0]);
    }
}
