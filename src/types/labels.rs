//! Class-index to display-name mapping.

use std::collections::HashMap;

/// Display name substituted when a class index has no registered label, and
/// the species name under which no disease stage can be selected.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Label vocabulary for one classifier head.
///
/// Lookups never fail: an index outside the vocabulary resolves to
/// [`UNKNOWN_LABEL`] so a sparse or outdated registry degrades the display
/// name, not the request.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    names: HashMap<usize, String>,
}

impl LabelMap {
    pub fn new(names: HashMap<usize, String>) -> Self {
        Self { names }
    }

    /// Display name for a class index, falling back to the sentinel.
    pub fn name(&self, index: usize) -> &str {
        self.names
            .get(&index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    /// Whether any index maps to the given display name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.values().any(|n| n == name)
    }

    /// True when the indices cover `0..len` without gaps. A map that is not
    /// contiguous still works; uncovered indices resolve to the sentinel.
    pub fn is_contiguous(&self) -> bool {
        (0..self.names.len()).all(|i| self.names.contains_key(&i))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(usize, S)> for LabelMap {
    fn from_iter<T: IntoIterator<Item = (usize, S)>>(iter: T) -> Self {
        Self {
            names: iter.into_iter().map(|(i, s)| (i, s.into())).collect(),
        }
    }
}
