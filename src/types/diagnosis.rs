//! Diagnosis results produced by the classifier cascade.

use crate::types::labels::UNKNOWN_LABEL;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Display name a disease or nutrient head emits for an unaffected plant.
pub const HEALTHY_LABEL: &str = "healthy";

/// One entry of a ranked classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPair {
    pub label: String,
    /// Softmax probability over the full class set of the producing head,
    /// not renormalized over the returned slice.
    pub probability: f64,
}

/// Ranked output of one cascade stage, highest probability first.
///
/// An empty result means the stage did not run for this request, which is a
/// normal outcome for the gated disease and optional nutrient stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedResult {
    pub pairs: Vec<RankedPair>,
}

impl RankedResult {
    pub fn new(pairs: Vec<RankedPair>) -> Self {
        Self { pairs }
    }

    pub fn empty() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Highest-probability entry, if the stage ran.
    pub fn top(&self) -> Option<&RankedPair> {
        self.pairs.first()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Combined output of the three cascade stages for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub species: RankedResult,
    pub disease: RankedResult,
    pub nutrient: RankedResult,
}

impl DiagnosisResult {
    /// Top-1 species label, or the sentinel when the species stage produced
    /// nothing usable.
    pub fn resolved_species(&self) -> &str {
        self.species
            .top()
            .map(|p| p.label.as_str())
            .unwrap_or(UNKNOWN_LABEL)
    }
}

/// Outbound diagnosis report published for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub report_id: String,
    pub request_id: String,
    pub species: RankedResult,
    pub disease: RankedResult,
    pub nutrient: RankedResult,
    /// Top-1 species label the disease stage was keyed on.
    pub resolved_species: String,
    /// True when the disease stage ran and its top label is not healthy.
    pub disease_detected: bool,
    /// True when the nutrient stage ran and its top label is not healthy.
    pub deficiency_detected: bool,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosisReport {
    pub fn new(request_id: String, result: DiagnosisResult, processing_time: Duration) -> Self {
        let resolved_species = result.resolved_species().to_string();
        let disease_detected = indicates_issue(&result.disease);
        let deficiency_detected = indicates_issue(&result.nutrient);

        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            request_id,
            species: result.species,
            disease: result.disease,
            nutrient: result.nutrient,
            resolved_species,
            disease_detected,
            deficiency_detected,
            processing_time_ms: processing_time.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    /// Top-1 species probability, 0.0 when the species stage was empty.
    pub fn species_confidence(&self) -> f64 {
        self.species.top().map(|p| p.probability).unwrap_or(0.0)
    }
}

/// A stage flags a problem when it ran and its most likely class is not the
/// healthy one. The comparison ignores case so exported vocabularies with
/// `Healthy` behave the same.
fn indicates_issue(stage: &RankedResult) -> bool {
    match stage.top() {
        Some(top) => !top.label.eq_ignore_ascii_case(HEALTHY_LABEL),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(pairs: &[(&str, f64)]) -> RankedResult {
        RankedResult::new(
            pairs
                .iter()
                .map(|(label, probability)| RankedPair {
                    label: label.to_string(),
                    probability: *probability,
                })
                .collect(),
        )
    }

    #[test]
    fn test_resolved_species_from_top_pair() {
        let result = DiagnosisResult {
            species: ranked(&[("rose", 0.9), ("tomato", 0.1)]),
            disease: RankedResult::empty(),
            nutrient: RankedResult::empty(),
        };
        assert_eq!(result.resolved_species(), "rose");
    }

    #[test]
    fn test_resolved_species_sentinel_when_empty() {
        let result = DiagnosisResult::default();
        assert_eq!(result.resolved_species(), UNKNOWN_LABEL);
    }

    #[test]
    fn test_report_flags_disease() {
        let result = DiagnosisResult {
            species: ranked(&[("rose", 0.9)]),
            disease: ranked(&[("black_spot", 0.8), ("healthy", 0.2)]),
            nutrient: RankedResult::empty(),
        };
        let report = DiagnosisReport::new("req-1".to_string(), result, Duration::from_millis(42));

        assert_eq!(report.resolved_species, "rose");
        assert!(report.disease_detected);
        assert!(!report.deficiency_detected);
        assert_eq!(report.processing_time_ms, 42);
        assert!(!report.report_id.is_empty());
    }

    #[test]
    fn test_healthy_top_label_is_not_flagged() {
        let result = DiagnosisResult {
            species: ranked(&[("rose", 0.9)]),
            disease: ranked(&[("Healthy", 0.7), ("black_spot", 0.3)]),
            nutrient: ranked(&[("nitrogen_deficiency", 0.6), ("healthy", 0.4)]),
        };
        let report = DiagnosisReport::new("req-2".to_string(), result, Duration::from_millis(5));

        // Case-insensitive healthy match on the top pair only.
        assert!(!report.disease_detected);
        assert!(report.deficiency_detected);
    }

    #[test]
    fn test_skipped_stage_is_never_flagged() {
        let result = DiagnosisResult {
            species: ranked(&[("rose", 0.9)]),
            disease: RankedResult::empty(),
            nutrient: RankedResult::empty(),
        };
        let report = DiagnosisReport::new("req-3".to_string(), result, Duration::from_millis(5));

        assert!(!report.disease_detected);
        assert!(!report.deficiency_detected);
    }

    #[test]
    fn test_report_serialization_round_trip() {
        let result = DiagnosisResult {
            species: ranked(&[("tomato", 0.75), ("rose", 0.25)]),
            disease: ranked(&[("early_blight", 0.6), ("healthy", 0.4)]),
            nutrient: RankedResult::empty(),
        };
        let report = DiagnosisReport::new("req-4".to_string(), result, Duration::from_millis(17));

        let json = serde_json::to_string(&report).unwrap();
        let parsed: DiagnosisReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, report.request_id);
        assert_eq!(parsed.resolved_species, "tomato");
        assert_eq!(parsed.species.pairs, report.species.pairs);
        assert!(parsed.disease_detected);
    }

    #[test]
    fn test_species_confidence() {
        let result = DiagnosisResult {
            species: ranked(&[("rose", 0.8), ("tomato", 0.2)]),
            disease: RankedResult::empty(),
            nutrient: RankedResult::empty(),
        };
        let report = DiagnosisReport::new("req-5".to_string(), result, Duration::from_millis(1));
        assert!((report.species_confidence() - 0.8).abs() < 1e-12);

        let empty = DiagnosisReport::new(
            "req-6".to_string(),
            DiagnosisResult::default(),
            Duration::from_millis(1),
        );
        assert_eq!(empty.species_confidence(), 0.0);
    }
}
