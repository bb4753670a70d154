//! Error types for the plant diagnosis pipeline.
//!
//! Startup failures (`RegistryError`, `ModelLoadError`) are fatal and leave
//! no partially-initialized state behind; `InferenceError` is scoped to a
//! single request and never affects the shared model store.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or validating the model registry document.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("registry root must be a JSON object")]
    NotAnObject,

    #[error("required registry field `{0}` is missing")]
    MissingField(&'static str),

    #[error("label index `{key}` in {field} is not a non-negative integer")]
    InvalidLabelIndex { field: String, key: String },

    #[error("label index {index} appears more than once in {field}")]
    DuplicateLabelIndex { field: String, index: usize },

    #[error("disease classifier `{0}` does not match any species label")]
    UnknownDiseaseSpecies(String),
}

/// Failures while resolving a registry entry into a runnable classifier.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("ONNX Runtime initialization failed: {0}")]
    Init(#[source] ort::Error),

    #[error("classifier artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to load classifier `{name}` from {}: {source}", path.display())]
    Session {
        name: String,
        path: PathBuf,
        #[source]
        source: ort::Error,
    },

    #[error("classifier `{name}` is not usable as a classifier: {reason}")]
    Incompatible { name: String, reason: String },
}

/// Failures during a single inference request.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("input tensor has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    #[error("top-k must be at least 1")]
    InvalidTopK,

    #[error("classifier `{name}` forward pass failed: {message}")]
    Forward { name: String, message: String },

    #[error("classifier `{name}` returned output shape {shape:?}, expected a single row of logits")]
    OutputShape { name: String, shape: Vec<i64> },

    #[error("classifier `{name}` produced an empty logit vector")]
    EmptyLogits { name: String },
}
