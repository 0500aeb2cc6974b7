use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The symptoms a user has reported, split into those currently active and
/// those explicitly denied. A symptom is never in both sets at once.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SymptomSet {
    active: BTreeSet<String>,
    excluded: BTreeSet<String>,
}

impl SymptomSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one batch of additions and removals.
    ///
    /// Additions land first: each added symptom becomes active and any
    /// standing exclusion for it is lifted. Removals land second, so a
    /// symptom named in both lists of the same batch ends up excluded.
    /// Returns the active symptoms after the batch, sorted.
    pub fn apply(&mut self, to_add: &[String], to_remove: &[String]) -> Vec<String> {
        for s in to_add {
            let s = s.trim();
            if s.is_empty() {
                continue;
            }
            self.excluded.remove(s);
            self.active.insert(s.to_owned());
        }
        for s in to_remove {
            let s = s.trim();
            if s.is_empty() {
                continue;
            }
            self.active.remove(s);
            self.excluded.insert(s.to_owned());
        }
        self.active_vec()
    }

    pub fn active(&self) -> &BTreeSet<String> {
        &self.active
    }

    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    /// Active symptoms as a sorted list.
    pub fn active_vec(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    /// Excluded symptoms as a sorted list.
    pub fn excluded_vec(&self) -> Vec<String> {
        self.excluded.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.excluded.clear();
    }
}
