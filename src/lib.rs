//! Plant Diagnosis Pipeline Library
//!
//! Diagnoses plant health from single leaf images by cascading a species
//! classifier, species-specific disease classifiers, and an optional
//! nutrient-deficiency classifier over ONNX Runtime.

pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod producer;
pub mod registry;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{InferenceError, ModelLoadError, RegistryError};
pub use models::{CascadeController, Classifier, InferenceEngine, ModelLoader, ModelStore};
pub use preprocess::ImagePreprocessor;
pub use producer::ReportProducer;
pub use registry::Registry;
pub use types::{DiagnosisReport, DiagnosisRequest, DiagnosisResult};
