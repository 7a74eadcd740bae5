//! ONNX Runtime backend for the captcha classifier.
//!
//! The model takes a `[1, 3, 42, 130]` RGB tensor and emits `[1, 15, 8]`
//! scores (classes by positions).

use super::{CaptchaModel, InputTensor, ScoreMatrix, CHARSET, POSITIONS};
use crate::error::CaptchaError;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;

/// Captcha classifier loaded from an `.onnx` file.
pub struct OnnxCaptchaModel {
    session: Session,
}

impl OnnxCaptchaModel {
    /// Load the model, failing with `ModelNotFound` if the file is absent.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CaptchaError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CaptchaError::ModelNotFound(path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e| {
                CaptchaError::InferenceFailed(format!(
                    "Failed to create ONNX session builder: {}",
                    e
                ))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                CaptchaError::InferenceFailed(format!("Failed to set optimization level: {}", e))
            })?
            .commit_from_file(path)
            .map_err(|e| {
                CaptchaError::InferenceFailed(format!("Failed to load ONNX model: {}", e))
            })?;

        tracing::info!("Loaded captcha model from {}", path.display());
        Ok(Self { session })
    }
}

impl CaptchaModel for OnnxCaptchaModel {
    fn infer(&mut self, input: &InputTensor) -> Result<ScoreMatrix, CaptchaError> {
        let [n, c, h, w] = input.shape();
        let array = Array4::from_shape_vec((n, c, h, w), input.data.clone()).map_err(|e| {
            CaptchaError::InferenceFailed(format!("Failed to shape input tensor: {}", e))
        })?;

        // Create input value from ndarray (must be owned, not a view)
        let input_value = ort::value::Value::from_array(array).map_err(|e| {
            CaptchaError::InferenceFailed(format!("Failed to create input tensor: {}", e))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| CaptchaError::InferenceFailed(format!("ONNX inference failed: {}", e)))?;

        let (_, output_value) = outputs
            .iter()
            .next()
            .ok_or_else(|| CaptchaError::InferenceFailed("No output from model".into()))?;

        let (_, output_data) = output_value.try_extract_tensor::<f32>().map_err(|e| {
            CaptchaError::InferenceFailed(format!("Failed to extract output tensor: {}", e))
        })?;

        ScoreMatrix::from_class_major(CHARSET.len(), POSITIONS, output_data)
    }
}
