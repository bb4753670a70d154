//! Type definitions for the plant diagnosis pipeline

pub mod diagnosis;
pub mod labels;
pub mod request;

pub use diagnosis::{DiagnosisReport, DiagnosisResult, RankedPair, RankedResult, HEALTHY_LABEL};
pub use labels::{LabelMap, UNKNOWN_LABEL};
pub use request::DiagnosisRequest;
