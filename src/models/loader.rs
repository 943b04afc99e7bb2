//! Model artifact loader

use crate::config::{ModelConfig, ModelFormat};
use crate::error::{EvalError, Result};
use crate::models::archive::{ArtifactExtractor, ExtractedArtifact};
use crate::models::predictor::Predictor;
use crate::models::xgboost::XgboostPredictor;
use std::path::{Path, PathBuf};
use tracing::info;

/// Extracts a model archive and deserializes the predictor inside it
pub struct ModelLoader {
    extractor: ArtifactExtractor,
    format: ModelFormat,
    /// Expected feature count for formats that do not record it
    num_features: Option<usize>,
    /// Number of threads for ONNX inference
    #[cfg_attr(not(feature = "onnx"), allow(dead_code))]
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a loader for XGBoost JSON models stored under `model_file_name`
    pub fn new(model_file_name: impl Into<String>) -> Self {
        Self {
            extractor: ArtifactExtractor::new(model_file_name),
            format: ModelFormat::Xgboost,
            num_features: None,
            onnx_threads: 1,
        }
    }

    /// Create a loader from the model section of the configuration
    pub fn from_config(config: &ModelConfig, scratch_root: Option<PathBuf>) -> Self {
        Self {
            extractor: ArtifactExtractor::new(config.file_name.clone())
                .with_scratch_root(scratch_root),
            format: config.format,
            num_features: config.num_features,
            onnx_threads: config.onnx_threads,
        }
    }

    /// Decompress the archive into request-local scratch space
    pub fn extract<P: AsRef<Path>>(&self, archive_path: P) -> Result<ExtractedArtifact> {
        self.extractor.extract(archive_path)
    }

    /// Deserialize the predictor from an extracted artifact
    pub fn load(&self, artifact: &ExtractedArtifact) -> Result<Box<dyn Predictor>> {
        let path = artifact.model_path();
        info!(format = ?self.format, path = %path.display(), "Loading model");

        let predictor: Box<dyn Predictor> = match self.format {
            ModelFormat::Xgboost => {
                let predictor = XgboostPredictor::load(path)?;
                if let Some(expected) = self.num_features {
                    let actual = predictor.num_features();
                    if expected != actual {
                        return Err(EvalError::model_load(
                            path,
                            format!(
                                "model has {actual} features but configuration expects {expected}"
                            ),
                        ));
                    }
                }
                Box::new(predictor)
            }
            ModelFormat::Onnx => self.load_onnx(path)?,
        };

        info!(
            model = predictor.name(),
            features = predictor.num_features(),
            "Model loaded successfully"
        );
        Ok(predictor)
    }

    /// Extract and load in one step; the scratch directory is removed before returning
    pub fn load_archive<P: AsRef<Path>>(&self, archive_path: P) -> Result<Box<dyn Predictor>> {
        let artifact = self.extract(archive_path)?;
        self.load(&artifact)
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, path: &Path) -> Result<Box<dyn Predictor>> {
        let num_features = self
            .num_features
            .ok_or_else(|| EvalError::model_load(path, "onnx models require model.num_features"))?;
        let predictor =
            crate::models::onnx::OnnxPredictor::load(path, num_features, self.onnx_threads)?;
        Ok(Box::new(predictor))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, path: &Path) -> Result<Box<dyn Predictor>> {
        Err(EvalError::model_load(
            path,
            "onnx support is not compiled in (enable the `onnx` feature)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::archive::tests::write_archive;
    use crate::models::ubjson::tests::encode as ubjson_encode;
    use crate::models::xgboost::tests::staircase_model;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_load_xgboost_archive() {
        let dir = TempDir::new().unwrap();
        let model = staircase_model().to_string();
        let archive = write_archive(dir.path(), &[("xgboost-model", model.as_bytes())]);

        let predictor = ModelLoader::new("xgboost-model")
            .load_archive(&archive)
            .unwrap();
        assert_eq!(predictor.name(), "xgboost");
        assert_eq!(predictor.num_features(), 1);
        assert_eq!(
            predictor.predict(&array![[1.0], [2.0], [3.0]]).unwrap().to_vec(),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_load_ubjson_archive() {
        let dir = TempDir::new().unwrap();
        let model = ubjson_encode(&staircase_model());
        let archive = write_archive(dir.path(), &[("xgboost-model", model.as_slice())]);

        let predictor = ModelLoader::new("xgboost-model")
            .load_archive(&archive)
            .unwrap();
        assert_eq!(
            predictor.predict(&array![[1.0], [2.0], [3.0]]).unwrap().to_vec(),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_corrupt_model_is_load_error() {
        let dir = TempDir::new().unwrap();
        let archive = write_archive(dir.path(), &[("xgboost-model", &b"{not json"[..])]);

        let err = ModelLoader::new("xgboost-model")
            .load_archive(&archive)
            .err()
            .unwrap();
        assert!(matches!(err, EvalError::ModelLoad { .. }));
    }

    #[test]
    fn test_configured_feature_count_must_match() {
        let dir = TempDir::new().unwrap();
        let model = staircase_model().to_string();
        let archive = write_archive(dir.path(), &[("xgboost-model", model.as_bytes())]);

        let config = ModelConfig {
            num_features: Some(4),
            ..ModelConfig::default()
        };
        let err = ModelLoader::from_config(&config, None)
            .load_archive(&archive)
            .err()
            .unwrap();
        assert!(matches!(err, EvalError::ModelLoad { .. }));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_without_feature_is_load_error() {
        let dir = TempDir::new().unwrap();
        let archive = write_archive(dir.path(), &[("model.onnx", &b"\x08\x07"[..])]);

        let config = ModelConfig {
            format: ModelFormat::Onnx,
            file_name: "model.onnx".to_string(),
            num_features: Some(3),
            onnx_threads: 1,
        };
        let err = ModelLoader::from_config(&config, None)
            .load_archive(&archive)
            .err()
            .unwrap();
        assert!(matches!(err, EvalError::ModelLoad { .. }));
    }
}
