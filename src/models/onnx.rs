//! ONNX Runtime predictor, enabled with the `onnx` feature

use crate::error::{EvalError, Result};
use crate::models::predictor::{Prediction, Predictor};
use ndarray::{Array1, ArrayView2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Regression model served by an ONNX Runtime session
pub struct OnnxPredictor {
    /// Session (wrapped in RwLock because `run` needs `&mut`)
    session: RwLock<Session>,
    /// Input name for the feature tensor
    input_name: String,
    /// Output holding one prediction per row
    output_name: String,
    /// Trained feature count, supplied by configuration
    num_features: usize,
    /// Model file, for error context
    path: PathBuf,
}

impl OnnxPredictor {
    /// Load an ONNX graph from file
    pub fn load<P: AsRef<Path>>(path: P, num_features: usize, threads: usize) -> Result<Self> {
        let path = path.as_ref();
        let err = |e: ort::Error| EvalError::model_load(path, e.to_string());

        ort::init().commit().map_err(err)?;
        info!(path = %path.display(), threads, "Loading ONNX model");

        let session = Session::builder()
            .map_err(err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(err)?
            .with_intra_threads(threads)
            .map_err(err)?
            .commit_from_file(path)
            .map_err(err)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| EvalError::model_load(path, "model has no inputs"))?;

        let output_name = first_f32_output(
            session
                .outputs
                .iter()
                .map(|o| (o.name.as_str(), is_f32_tensor(&o.output_type))),
        )
        .map(str::to_string)
        .ok_or_else(|| EvalError::model_load(path, "model has no f32 tensor output"))?;

        info!(
            input = %input_name,
            output = %output_name,
            features = num_features,
            "ONNX model loaded successfully"
        );

        Ok(Self {
            session: RwLock::new(session),
            input_name,
            output_name,
            num_features,
            path: path.to_path_buf(),
        })
    }

    fn inference_error(&self, reason: impl std::fmt::Display) -> EvalError {
        EvalError::inference(&self.path, reason.to_string())
    }
}

fn is_f32_tensor(ty: &ValueType) -> bool {
    matches!(
        ty,
        ValueType::Tensor {
            ty: TensorElementType::Float32,
            ..
        }
    )
}

/// Name of the first output that is an f32 tensor
fn first_f32_output<'a>(outputs: impl IntoIterator<Item = (&'a str, bool)>) -> Option<&'a str> {
    outputs
        .into_iter()
        .find(|&(_, is_f32)| is_f32)
        .map(|(name, _)| name)
}

impl Predictor for OnnxPredictor {
    fn name(&self) -> &str {
        "onnx"
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict_rows(&self, features: ArrayView2<'_, f64>) -> Result<Prediction> {
        let (rows, cols) = features.dim();
        let shape = vec![rows as i64, cols as i64];
        let data: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let input_tensor =
            Tensor::from_array((shape, data)).map_err(|e| self.inference_error(e))?;

        let mut session = self
            .session
            .write()
            .map_err(|e| self.inference_error(format!("lock error: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| self.inference_error(e))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| self.inference_error("output missing"))?;
        let (_, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| self.inference_error(e))?;

        debug!(rows, outputs = values.len(), "ONNX inference complete");
        Ok(Array1::from_iter(values.iter().map(|&v| v as f64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_f32_output_selected() {
        let outputs = [("label", false), ("variable", true), ("probabilities", true)];
        assert_eq!(first_f32_output(outputs), Some("variable"));
    }

    #[test]
    fn test_no_f32_output() {
        assert_eq!(first_f32_output([("label", false)]), None);
        assert_eq!(first_f32_output(Vec::<(&str, bool)>::new()), None);
    }
}
