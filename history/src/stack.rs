//! One entity's snapshots and the cursor into them.

#[cfg(test)]
#[path = "stack_test.rs"]
mod stack_test;

use geometry::Feature;
use serde::{Deserialize, Serialize};

/// One snapshot of a feature, labelled with the operation that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackItem {
    pub annotation: String,
    pub feature: Feature,
}

impl StackItem {
    #[must_use]
    pub fn new(annotation: impl Into<String>, feature: Feature) -> Self {
        Self { annotation: annotation.into(), feature }
    }
}

/// Ordered snapshots of one entity plus a cursor.
///
/// Item 0 is the base: the state before this session touched the entity, or
/// a ghost when the session created it. The cursor never leaves
/// `[0, items.len() - 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionStack {
    items: Vec<StackItem>,
    index: usize,
}

impl VersionStack {
    /// A stack holding only its base snapshot.
    #[must_use]
    pub fn with_base(base: StackItem) -> Self {
        Self { items: vec![base], index: 0 }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn items(&self) -> &[StackItem] {
        &self.items
    }

    /// The base snapshot.
    #[must_use]
    pub fn base(&self) -> Option<&Feature> {
        self.items.first().map(|item| &item.feature)
    }

    /// The snapshot under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Feature> {
        self.items.get(self.index).map(|item| &item.feature)
    }

    /// Returns `true` when the cursor is at the newest snapshot.
    #[must_use]
    pub fn at_top(&self) -> bool {
        self.index + 1 >= self.items.len()
    }

    /// Drop every snapshot above the cursor, append `item`, and move the
    /// cursor onto it.
    pub fn push(&mut self, item: StackItem) {
        self.items.truncate(self.index + 1);
        self.items.push(item);
        self.index = self.items.len() - 1;
    }

    /// Move the cursor one snapshot back. Returns `(from, to)`, or `None` at the base.
    pub fn step_back(&mut self) -> Option<(&Feature, &Feature)> {
        if self.index == 0 || self.index >= self.items.len() {
            return None;
        }
        self.index -= 1;
        let from = &self.items[self.index + 1].feature;
        let to = &self.items[self.index].feature;
        Some((from, to))
    }

    /// Move the cursor one snapshot forward. Returns `(from, to)`, or `None` at the top.
    pub fn step_forward(&mut self) -> Option<(&Feature, &Feature)> {
        if self.at_top() {
            return None;
        }
        self.index += 1;
        let from = &self.items[self.index - 1].feature;
        let to = &self.items[self.index].feature;
        Some((from, to))
    }

    /// Returns `true` when the stack is non-empty, the cursor is in range, and
    /// every snapshot belongs to `id`.
    #[must_use]
    pub fn is_consistent(&self, id: &str) -> bool {
        self.index < self.items.len() && self.items.iter().all(|item| item.feature.id == id)
    }
}
