//! Stateless top-k inference over a single classifier.

use crate::error::InferenceError;
use crate::models::Classifier;
use crate::types::diagnosis::{RankedPair, RankedResult};
use crate::types::labels::LabelMap;
use ndarray::Array3;
use tracing::debug;

/// Channels every classifier input carries (RGB).
pub const INPUT_CHANNELS: usize = 3;
/// Input height in pixels, fixed by the exported graphs.
pub const INPUT_HEIGHT: usize = 224;
/// Input width in pixels, fixed by the exported graphs.
pub const INPUT_WIDTH: usize = 224;

/// Turns one classifier forward pass into a ranked top-k result.
///
/// The engine holds no state; which classifier runs, and with which labels,
/// is the caller's decision.
pub struct InferenceEngine;

impl InferenceEngine {
    /// Run `classifier` on `tensor` and return the `k` most probable classes
    /// as (label, probability) pairs, highest first.
    ///
    /// Probabilities come from a softmax over the full class set, so they sum
    /// to 1 across all classes rather than across the returned slice. A `k`
    /// beyond the class count is clamped to it; `k == 0` is rejected. Equal
    /// probabilities rank the lower class index first, keeping repeat runs
    /// on the same input identical.
    pub fn infer(
        classifier: &dyn Classifier,
        labels: &LabelMap,
        tensor: &Array3<f32>,
        k: usize,
    ) -> Result<RankedResult, InferenceError> {
        if k == 0 {
            return Err(InferenceError::InvalidTopK);
        }
        check_input_shape(tensor)?;

        let logits = classifier.forward(tensor)?;
        if logits.is_empty() {
            return Err(InferenceError::EmptyLogits {
                name: classifier.name().to_string(),
            });
        }

        let probabilities = softmax(&logits);
        let pairs: Vec<RankedPair> = top_k(&probabilities, k)
            .into_iter()
            .map(|(index, probability)| RankedPair {
                label: labels.name(index).to_string(),
                probability,
            })
            .collect();

        debug!(
            model = %classifier.name(),
            classes = logits.len(),
            k = pairs.len(),
            "Inference complete"
        );

        Ok(RankedResult::new(pairs))
    }
}

fn check_input_shape(tensor: &Array3<f32>) -> Result<(), InferenceError> {
    let (c, h, w) = tensor.dim();
    if (c, h, w) != (INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH) {
        return Err(InferenceError::ShapeMismatch {
            expected: [INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH],
            actual: [c, h, w],
        });
    }
    Ok(())
}

/// Numerically stable softmax, computed in f64 after shifting by the max
/// logit so large activations cannot overflow the exponential.
fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&l| f64::from(l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Indices of the `k` largest probabilities, descending, equal values ordered
/// by ascending index.
fn top_k(probabilities: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut indexed: Vec<(usize, f64)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    indexed.truncate(k.min(probabilities.len()));
    indexed
}
