//! Model artifact handling and batch inference

pub mod archive;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod predictor;
pub mod ubjson;
pub mod xgboost;

pub use archive::{ArtifactExtractor, ExtractedArtifact};
pub use loader::ModelLoader;
pub use predictor::{Prediction, Predictor};
pub use xgboost::XgboostPredictor;
