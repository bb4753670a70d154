//! ONNX-backed classifiers and their loader.

use crate::error::{InferenceError, ModelLoadError};
use crate::models::Classifier;
use ndarray::{Array3, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// A classifier backed by an ONNX Runtime session.
///
/// Session runs take `&mut self`, so forward passes on one model are
/// serialized behind a mutex. Distinct models run concurrently.
#[derive(Debug)]
pub struct OnnxClassifier {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: &Array3<f32>) -> Result<Vec<f32>, InferenceError> {
        // [C, H, W] -> [1, C, H, W]; the exported graphs take a batch of one.
        let batched = input.view().insert_axis(Axis(0)).to_owned();
        let tensor = Tensor::from_array(batched).map_err(|e| self.forward_error(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| self.forward_error("session mutex poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => tensor])
            .map_err(|e| self.forward_error(e.to_string()))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            self.forward_error(format!("output `{}` missing from results", self.output_name))
        })?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| self.forward_error(e.to_string()))?;

        // Accept [1, N] or a plain [N] logit row.
        let dims: Vec<i64> = shape.iter().copied().collect();
        match dims.as_slice() {
            [1, n] | [n] if *n as usize == data.len() => Ok(data.to_vec()),
            _ => Err(InferenceError::OutputShape {
                name: self.name.clone(),
                shape: dims,
            }),
        }
    }
}

impl OnnxClassifier {
    fn forward_error(&self, message: String) -> InferenceError {
        InferenceError::Forward {
            name: self.name.clone(),
            message,
        }
    }
}

/// Loader turning registry artifact paths into ready classifiers.
pub struct ModelLoader {
    /// Number of intra-op threads per ONNX session
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a loader with default settings (1 thread per session).
    pub fn new() -> Result<Self, ModelLoadError> {
        Self::with_threads(1)
    }

    /// Create a loader with the given per-session thread count.
    pub fn with_threads(onnx_threads: usize) -> Result<Self, ModelLoadError> {
        // Initialize ONNX Runtime
        ort::init().commit().map_err(ModelLoadError::Init)?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single classifier from an ONNX file.
    ///
    /// Sessions are built for inference only; a graph that exposes no input
    /// or no output cannot serve as a classifier and is rejected here rather
    /// than at request time.
    pub fn load<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<OnnxClassifier, ModelLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelLoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX classifier");

        let session = self
            .build_session(path)
            .map_err(|source| ModelLoadError::Session {
                name: name.to_string(),
                path: path.to_path_buf(),
                source,
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| ModelLoadError::Incompatible {
                name: name.to_string(),
                reason: "graph has no inputs".to_string(),
            })?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelLoadError::Incompatible {
                name: name.to_string(),
                reason: "graph has no outputs".to_string(),
            })?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Classifier loaded successfully"
        );

        Ok(OnnxClassifier {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    fn build_session(&self, path: &Path) -> Result<Session, ort::Error> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
    }
}

// Loading tests would require ONNX model artifacts on disk; the classifier
// capability itself is covered through the stub implementations in the
// inference and cascade tests.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_is_rejected_before_session_build() {
        let loader = ModelLoader { onnx_threads: 1 };
        let err = loader
            .load("does/not/exist.onnx", "species")
            .unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound { .. }));
    }
}
