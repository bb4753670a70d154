//! Model registry: classifier artifact locations and label vocabularies.
//!
//! The registry is a JSON document parsed once at startup into an immutable
//! value. Malformed documents are rejected eagerly so a bad deploy fails the
//! process instead of surfacing mid-request.

use crate::error::RegistryError;
use crate::types::labels::LabelMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level fields every registry document must carry. `nutrients` may be
/// null, but the key itself has to be present.
const REQUIRED_FIELDS: [&str; 5] = [
    "species_classifier",
    "species_labels",
    "disease_classifiers",
    "nutrients",
    "nutrient_labels",
];

#[derive(Debug, Deserialize)]
struct RawRegistry {
    species_classifier: PathBuf,
    species_labels: HashMap<String, String>,
    disease_classifiers: HashMap<String, RawDiseaseEntry>,
    nutrients: Option<PathBuf>,
    nutrient_labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawDiseaseEntry {
    model_path: PathBuf,
    disease_labels: HashMap<String, String>,
}

/// Disease classifier registration for one species.
#[derive(Debug, Clone)]
pub struct DiseaseEntry {
    pub model_path: PathBuf,
    pub labels: LabelMap,
}

/// Validated model registry.
#[derive(Debug, Clone)]
pub struct Registry {
    species_model: PathBuf,
    species_labels: LabelMap,
    disease: HashMap<String, DiseaseEntry>,
    nutrient_model: Option<PathBuf>,
    nutrient_labels: LabelMap,
}

impl Registry {
    /// Read and validate the registry file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json_str(&raw)?;
        info!(
            registry = %path.display(),
            species = registry.species_labels.len(),
            disease_models = registry.disease.len(),
            nutrients = registry.nutrient_model.is_some(),
            "Model registry loaded"
        );
        Ok(registry)
    }

    /// Parse and validate a registry document from a JSON string.
    ///
    /// Every required field must be present even when empty; `nutrients` set
    /// to null disables the nutrient stage. Disease classifier keys must
    /// match a species display name so the stage gate can ever select them.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let value: Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or(RegistryError::NotAnObject)?;
        for field in REQUIRED_FIELDS {
            if !object.contains_key(field) {
                return Err(RegistryError::MissingField(field));
            }
        }

        let raw: RawRegistry = serde_json::from_value(value)?;

        let species_labels = parse_labels("species_labels", &raw.species_labels)?;

        let mut disease = HashMap::with_capacity(raw.disease_classifiers.len());
        for (species, entry) in &raw.disease_classifiers {
            if !species_labels.contains_name(species) {
                return Err(RegistryError::UnknownDiseaseSpecies(species.clone()));
            }
            let labels = parse_labels(
                &format!("disease_labels for `{species}`"),
                &entry.disease_labels,
            )?;
            disease.insert(
                species.clone(),
                DiseaseEntry {
                    model_path: entry.model_path.clone(),
                    labels,
                },
            );
        }

        let nutrient_labels = parse_labels("nutrient_labels", &raw.nutrient_labels)?;

        Ok(Self {
            species_model: raw.species_classifier,
            species_labels,
            disease,
            nutrient_model: raw.nutrients,
            nutrient_labels,
        })
    }

    pub fn species_model(&self) -> &Path {
        &self.species_model
    }

    pub fn species_labels(&self) -> &LabelMap {
        &self.species_labels
    }

    pub fn disease_entries(&self) -> &HashMap<String, DiseaseEntry> {
        &self.disease
    }

    pub fn nutrient_model(&self) -> Option<&Path> {
        self.nutrient_model.as_deref()
    }

    pub fn nutrient_labels(&self) -> &LabelMap {
        &self.nutrient_labels
    }
}

/// Convert string-keyed JSON labels into an index-keyed map. Keys must parse
/// as non-negative integers and be unique after parsing (`"1"` and `"01"`
/// collide). Gaps only get a warning; uncovered indices fall back to the
/// sentinel at lookup time.
fn parse_labels(field: &str, raw: &HashMap<String, String>) -> Result<LabelMap, RegistryError> {
    let mut names = HashMap::with_capacity(raw.len());
    for (key, name) in raw {
        let index: usize = key.parse().map_err(|_| RegistryError::InvalidLabelIndex {
            field: field.to_string(),
            key: key.clone(),
        })?;
        if names.insert(index, name.clone()).is_some() {
            return Err(RegistryError::DuplicateLabelIndex {
                field: field.to_string(),
                index,
            });
        }
    }

    let labels = LabelMap::new(names);
    if !labels.is_contiguous() {
        warn!(
            field,
            entries = labels.len(),
            "Label indices are not contiguous from 0, uncovered classes will display as the sentinel"
        );
    }
    Ok(labels)
}
