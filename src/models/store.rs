//! Resolved classifier store shared across request workers.

use crate::error::ModelLoadError;
use crate::models::{Classifier, ModelLoader};
use crate::registry::Registry;
use crate::types::labels::LabelMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A species' disease classifier paired with its label vocabulary.
#[derive(Clone)]
pub struct DiseaseModel {
    pub classifier: Arc<dyn Classifier>,
    pub labels: LabelMap,
}

/// Every classifier resolved from the registry, ready to run.
///
/// Built once at startup and never mutated afterward; share it via `Arc`.
pub struct ModelStore {
    species: Arc<dyn Classifier>,
    species_labels: LabelMap,
    disease: HashMap<String, DiseaseModel>,
    nutrient: Option<Arc<dyn Classifier>>,
    nutrient_labels: LabelMap,
}

impl ModelStore {
    /// Eagerly load every artifact the registry names.
    ///
    /// The species classifier is the cascade's entry point and must load; a
    /// disease or nutrient artifact that fails only disables its stage, so
    /// one bad export does not take the whole service down.
    pub fn build(registry: &Registry, loader: &ModelLoader) -> Result<Self, ModelLoadError> {
        let species: Arc<dyn Classifier> =
            Arc::new(loader.load(registry.species_model(), "species")?);

        let mut disease = HashMap::with_capacity(registry.disease_entries().len());
        for (species_name, entry) in registry.disease_entries() {
            match loader.load(&entry.model_path, species_name) {
                Ok(classifier) => {
                    disease.insert(
                        species_name.clone(),
                        DiseaseModel {
                            classifier: Arc::new(classifier),
                            labels: entry.labels.clone(),
                        },
                    );
                }
                Err(e) => {
                    warn!(
                        species = %species_name,
                        error = %e,
                        "Failed to load disease classifier, stage disabled for this species"
                    );
                }
            }
        }

        let nutrient = match registry.nutrient_model() {
            Some(path) => match loader.load(path, "nutrients") {
                Ok(classifier) => Some(Arc::new(classifier) as Arc<dyn Classifier>),
                Err(e) => {
                    warn!(error = %e, "Failed to load nutrient classifier, nutrient stage disabled");
                    None
                }
            },
            None => None,
        };

        info!(
            disease_models = disease.len(),
            nutrients = nutrient.is_some(),
            "Model store ready"
        );

        Ok(Self {
            species,
            species_labels: registry.species_labels().clone(),
            disease,
            nutrient,
            nutrient_labels: registry.nutrient_labels().clone(),
        })
    }

    /// Assemble a store from already-built classifiers. The loading path goes
    /// through [`ModelStore::build`]; this constructor exists for callers
    /// that bring their own [`Classifier`] implementations.
    pub fn from_parts(
        species: Arc<dyn Classifier>,
        species_labels: LabelMap,
        disease: HashMap<String, DiseaseModel>,
        nutrient: Option<Arc<dyn Classifier>>,
        nutrient_labels: LabelMap,
    ) -> Self {
        Self {
            species,
            species_labels,
            disease,
            nutrient,
            nutrient_labels,
        }
    }

    pub fn species_classifier(&self) -> &dyn Classifier {
        self.species.as_ref()
    }

    pub fn species_labels(&self) -> &LabelMap {
        &self.species_labels
    }

    /// Disease classifier registered for a resolved species name, if any.
    pub fn disease_classifier(&self, species: &str) -> Option<&DiseaseModel> {
        self.disease.get(species)
    }

    pub fn nutrient_classifier(&self) -> Option<&dyn Classifier> {
        self.nutrient.as_deref()
    }

    pub fn nutrient_labels(&self) -> &LabelMap {
        &self.nutrient_labels
    }

    /// Species names that have a disease classifier loaded.
    pub fn disease_species(&self) -> Vec<&str> {
        self.disease.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::testing::FixedClassifier;

    fn stub_store() -> ModelStore {
        let mut disease = HashMap::new();
        disease.insert(
            "rose".to_string(),
            DiseaseModel {
                classifier: Arc::new(FixedClassifier::new("rose_disease", vec![0.5, 0.5])),
                labels: LabelMap::from_iter([(0, "black_spot"), (1, "healthy")]),
            },
        );

        ModelStore::from_parts(
            Arc::new(FixedClassifier::new("species", vec![1.0, 0.0])),
            LabelMap::from_iter([(0, "rose"), (1, "tomato")]),
            disease,
            None,
            LabelMap::default(),
        )
    }

    #[test]
    fn test_disease_lookup_by_species_name() {
        let store = stub_store();
        assert!(store.disease_classifier("rose").is_some());
        assert!(store.disease_classifier("tomato").is_none());
        assert_eq!(store.disease_species(), vec!["rose"]);
    }

    #[test]
    fn test_absent_nutrient_classifier() {
        let store = stub_store();
        assert!(store.nutrient_classifier().is_none());
        assert!(store.nutrient_labels().is_empty());
    }

    #[test]
    fn test_species_accessors() {
        let store = stub_store();
        assert_eq!(store.species_classifier().name(), "species");
        assert_eq!(store.species_labels().name(1), "tomato");
    }
}
