//! Three-stage diagnosis cascade: species, then disease, then nutrients.

use crate::error::InferenceError;
use crate::models::inference::InferenceEngine;
use crate::models::store::ModelStore;
use crate::types::diagnosis::{DiagnosisResult, RankedResult};
use crate::types::labels::UNKNOWN_LABEL;
use ndarray::Array3;
use std::sync::Arc;
use tracing::debug;

/// Runs the classifier cascade for one request.
///
/// The species stage always runs and its top-1 label selects the disease
/// classifier; the nutrient stage depends only on whether a nutrient model
/// is loaded. Stages run sequentially on the calling thread, so callers in
/// async context dispatch the whole call onto a blocking worker.
pub struct CascadeController {
    store: Arc<ModelStore>,
}

impl CascadeController {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self { store }
    }

    /// Diagnose one normalized leaf tensor, returning ranked results for all
    /// three stages.
    ///
    /// A disease or nutrient stage that does not apply comes back as an
    /// empty result, not an error; only a failing forward pass or an invalid
    /// input aborts the request.
    pub fn recognize(
        &self,
        tensor: &Array3<f32>,
        k: usize,
    ) -> Result<DiagnosisResult, InferenceError> {
        let species = InferenceEngine::infer(
            self.store.species_classifier(),
            self.store.species_labels(),
            tensor,
            k,
        )?;
        let resolved = species
            .top()
            .map(|p| p.label.as_str())
            .unwrap_or(UNKNOWN_LABEL)
            .to_string();

        let disease = if resolved == UNKNOWN_LABEL {
            debug!("Species unresolved, skipping disease stage");
            RankedResult::empty()
        } else {
            match self.store.disease_classifier(&resolved) {
                Some(model) => {
                    InferenceEngine::infer(model.classifier.as_ref(), &model.labels, tensor, k)?
                }
                None => {
                    debug!(species = %resolved, "No disease classifier registered for species");
                    RankedResult::empty()
                }
            }
        };

        // Independent of the species outcome.
        let nutrient = match self.store.nutrient_classifier() {
            Some(classifier) => {
                InferenceEngine::infer(classifier, self.store.nutrient_labels(), tensor, k)?
            }
            None => RankedResult::empty(),
        };

        debug!(
            species = %resolved,
            disease_pairs = disease.len(),
            nutrient_pairs = nutrient.len(),
            "Cascade complete"
        );

        Ok(DiagnosisResult {
            species,
            disease,
            nutrient,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inference::{INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH};
    use crate::models::store::DiseaseModel;
    use crate::models::testing::FixedClassifier;
    use crate::models::Classifier;
    use crate::types::labels::LabelMap;
    use std::collections::HashMap;

    fn input() -> Array3<f32> {
        Array3::zeros((INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH))
    }

    fn species_labels() -> LabelMap {
        LabelMap::from_iter([(0, "rose"), (1, "tomato")])
    }

    fn rose_disease_model() -> DiseaseModel {
        // logits [ln 4, 0] give disease probabilities [0.8, 0.2].
        DiseaseModel {
            classifier: Arc::new(FixedClassifier::new(
                "rose_disease",
                vec![(4.0f32).ln(), 0.0],
            )),
            labels: LabelMap::from_iter([(0, "black_spot"), (1, "healthy")]),
        }
    }

    fn controller(
        species_logits: Vec<f32>,
        species_labels: LabelMap,
        disease: HashMap<String, DiseaseModel>,
        nutrient: Option<(Vec<f32>, LabelMap)>,
    ) -> CascadeController {
        let (nutrient_classifier, nutrient_labels) = match nutrient {
            Some((logits, labels)) => (
                Some(Arc::new(FixedClassifier::new("nutrients", logits)) as Arc<dyn Classifier>),
                labels,
            ),
            None => (None, LabelMap::default()),
        };

        CascadeController::new(Arc::new(ModelStore::from_parts(
            Arc::new(FixedClassifier::new("species", species_logits)),
            species_labels,
            disease,
            nutrient_classifier,
            nutrient_labels,
        )))
    }

    #[test]
    fn test_full_cascade_for_recognized_species() {
        let mut disease = HashMap::new();
        disease.insert("rose".to_string(), rose_disease_model());

        let controller = controller(vec![2.0, 0.0], species_labels(), disease, None);
        let result = controller.recognize(&input(), 2).unwrap();

        assert_eq!(result.resolved_species(), "rose");
        assert_eq!(result.species.len(), 2);

        assert_eq!(result.disease.pairs[0].label, "black_spot");
        assert!((result.disease.pairs[0].probability - 0.8).abs() < 1e-9);
        assert_eq!(result.disease.pairs[1].label, "healthy");
        assert!((result.disease.pairs[1].probability - 0.2).abs() < 1e-9);

        assert!(result.nutrient.is_empty());
    }

    #[test]
    fn test_species_without_disease_model_skips_stage() {
        let mut disease = HashMap::new();
        disease.insert("rose".to_string(), rose_disease_model());

        // Top species is tomato, which has no disease classifier.
        let controller = controller(vec![0.0, 2.0], species_labels(), disease, None);
        let result = controller.recognize(&input(), 2).unwrap();

        assert_eq!(result.resolved_species(), "tomato");
        assert!(result.disease.is_empty());
    }

    #[test]
    fn test_sentinel_species_never_selects_disease_model() {
        let mut disease = HashMap::new();
        disease.insert("rose".to_string(), rose_disease_model());

        // Empty species vocabulary: the top-1 label is the sentinel.
        let controller = controller(vec![2.0, 0.0], LabelMap::default(), disease, None);
        let result = controller.recognize(&input(), 2).unwrap();

        assert_eq!(result.resolved_species(), UNKNOWN_LABEL);
        assert!(result.disease.is_empty());
    }

    #[test]
    fn test_nutrient_stage_runs_regardless_of_species_outcome() {
        let nutrient_labels = LabelMap::from_iter([(0, "healthy"), (1, "nitrogen_deficiency")]);

        // Unresolvable species, nutrient model configured.
        let controller = controller(
            vec![2.0, 0.0],
            LabelMap::default(),
            HashMap::new(),
            Some((vec![0.0, 1.0], nutrient_labels)),
        );
        let result = controller.recognize(&input(), 2).unwrap();

        assert_eq!(result.resolved_species(), UNKNOWN_LABEL);
        assert!(result.disease.is_empty());
        assert_eq!(result.nutrient.len(), 2);
        assert_eq!(result.nutrient.pairs[0].label, "nitrogen_deficiency");
    }

    #[test]
    fn test_no_nutrient_model_yields_empty_stage() {
        let controller = controller(vec![2.0, 0.0], species_labels(), HashMap::new(), None);
        let result = controller.recognize(&input(), 2).unwrap();
        assert!(result.nutrient.is_empty());
    }

    #[test]
    fn test_k_applies_to_every_stage() {
        let mut disease = HashMap::new();
        disease.insert("rose".to_string(), rose_disease_model());

        let controller = controller(
            vec![2.0, 0.0],
            species_labels(),
            disease,
            Some((
                vec![0.3, 0.2, 0.1],
                LabelMap::from_iter([(0, "healthy"), (1, "nitrogen"), (2, "potassium")]),
            )),
        );
        let result = controller.recognize(&input(), 1).unwrap();

        assert_eq!(result.species.len(), 1);
        assert_eq!(result.disease.len(), 1);
        assert_eq!(result.nutrient.len(), 1);
    }

    #[test]
    fn test_repeat_diagnoses_are_identical() {
        let mut disease = HashMap::new();
        disease.insert("rose".to_string(), rose_disease_model());

        let controller = controller(vec![2.0, 0.0], species_labels(), disease, None);
        let first = controller.recognize(&input(), 2).unwrap();
        let second = controller.recognize(&input(), 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_k_propagates() {
        let controller = controller(vec![2.0, 0.0], species_labels(), HashMap::new(), None);
        let err = controller.recognize(&input(), 0).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidTopK));
    }
}
