//! The visible feature layer: what the map currently draws.
//!
//! Features keep insertion order so exports and renders are stable. Drafts
//! never live here; the editor keeps in-progress drawings separately.

#[cfg(test)]
#[path = "layer_test.rs"]
mod layer_test;

use geometry::{Feature, FeatureId};

/// In-memory collection of visible features, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct FeatureLayer {
    features: Vec<Feature>,
}

impl FeatureLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a feature, or replace the one with the same id in place.
    pub fn upsert(&mut self, feature: Feature) {
        match self.features.iter_mut().find(|f| f.id == feature.id) {
            Some(slot) => *slot = feature,
            None => self.features.push(feature),
        }
    }

    /// Remove a feature by id, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<Feature> {
        let index = self.features.iter().position(|f| f.id == id)?;
        Some(self.features.remove(index))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replace the whole layer. Later duplicates of an id replace earlier ones.
    pub fn load(&mut self, features: Vec<Feature>) {
        self.features.clear();
        for feature in features {
            self.upsert(feature);
        }
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn ids(&self) -> impl Iterator<Item = &FeatureId> {
        self.features.iter().map(|f| &f.id)
    }

    /// Every feature except `id`, used as snap candidates for it.
    #[must_use]
    pub fn others(&self, id: &str) -> Vec<Feature> {
        self.features.iter().filter(|f| f.id != id).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
