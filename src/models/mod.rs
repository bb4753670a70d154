//! ML model components: the classifier capability, loading, storage and the
//! diagnosis cascade.

pub mod cascade;
pub mod inference;
pub mod loader;
pub mod store;

pub use cascade::CascadeController;
pub use inference::InferenceEngine;
pub use loader::{ModelLoader, OnnxClassifier};
pub use store::ModelStore;

use crate::error::InferenceError;
use ndarray::Array3;

/// The one capability every model in the pipeline exposes: a forward pass
/// from a normalized image tensor to unnormalized per-class scores.
///
/// Implementations are immutable after construction and safe to call from
/// multiple threads; [`OnnxClassifier`] serializes runs on its session
/// internally.
pub trait Classifier: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Run the model on a single CHW image tensor, returning one logit per
    /// class.
    fn forward(&self, input: &Array3<f32>) -> Result<Vec<f32>, InferenceError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Classifier;
    use crate::error::InferenceError;
    use ndarray::Array3;

    /// Classifier returning fixed logits, for exercising the engine and the
    /// cascade without ONNX Runtime.
    pub struct FixedClassifier {
        name: String,
        logits: Vec<f32>,
    }

    impl FixedClassifier {
        pub fn new(name: &str, logits: Vec<f32>) -> Self {
            Self {
                name: name.to_string(),
                logits,
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            &self.name
        }

        fn forward(&self, _input: &Array3<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(self.logits.clone())
        }
    }

    /// Classifier that always fails, for error-path tests.
    pub struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn forward(&self, _input: &Array3<f32>) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Forward {
                name: "failing".to_string(),
                message: "simulated failure".to_string(),
            })
        }
    }
}
