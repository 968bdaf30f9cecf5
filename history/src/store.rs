//! The history store: version stacks, the action log, and the global cursor.
//!
//! DESIGN
//! ======
//! The global cursor points at the newest applied action record. Undo steps
//! every stack named by that record back one snapshot and moves the cursor
//! down; redo reads the record just above the cursor and steps forward.
//!
//! Redo is only available for records undone since the last push (the redo
//! budget). A push drops every record above the cursor and every snapshot
//! above each touched stack's cursor, so an undone branch can never be
//! replayed after new edits.
//!
//! Draft records (see [`crate::draft`]) live in the same log. When the
//! finished feature is pushed, the draft's stack is deleted and its id is
//! stripped from the log; records left empty are removed and the cursor is
//! shifted down past them.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::{HashMap, HashSet};
use std::fmt;

use geometry::{Feature, FeatureId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::draft::{draft_id, is_draft};
use crate::error::HistoryError;
use crate::snapshot::{HistorySnapshot, SnapshotSink};
use crate::stack::{StackItem, VersionStack};

/// Annotation of the base snapshot seeded for every new stack.
pub const BASE_ANNOTATION: &str = "add base";

const RECORD_SEPARATOR: char = '#';

/// Ids mutated together by one user operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    ids: Vec<FeatureId>,
}

impl ActionRecord {
    #[must_use]
    pub fn ids(&self) -> &[FeatureId] {
        &self.ids
    }

    fn encode(&self) -> String {
        self.ids.join(&RECORD_SEPARATOR.to_string())
    }

    fn decode(encoded: &str) -> Self {
        Self { ids: encoded.split(RECORD_SEPARATOR).map(str::to_owned).collect() }
    }
}

/// One entity's transition produced by undo or redo.
///
/// `None` means the entity is absent on that side: the host removes it when
/// `new_value` is `None` and upserts it otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryChange {
    pub id: FeatureId,
    pub old_value: Option<Feature>,
    pub new_value: Option<Feature>,
}

impl HistoryChange {
    fn between(id: FeatureId, from: &Feature, to: &Feature) -> Self {
        Self { id, old_value: present(from), new_value: present(to) }
    }
}

fn present(feature: &Feature) -> Option<Feature> {
    feature.has_geometry().then(|| feature.clone())
}

/// How an entity differs from its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Add,
    Update,
    Delete,
}

/// An unsaved change: the entity's current snapshot and how it differs from its base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub op: ChangeOp,
    pub feature: Feature,
}

/// Versioned history for every entity touched in an editing session.
#[derive(Default)]
pub struct HistoryStore {
    stacks: HashMap<FeatureId, VersionStack>,
    log: Vec<ActionRecord>,
    cursor: Option<usize>,
    redo_budget: usize,
    sink: Option<Box<dyn SnapshotSink>>,
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("stacks", &self.stacks.len())
            .field("log", &self.log.len())
            .field("cursor", &self.cursor)
            .field("redo_budget", &self.redo_budget)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl HistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a durable snapshot sink, written after every mutation.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Rebuild a store from a persisted snapshot. The redo budget restarts at 0.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::CorruptSnapshot`] when the cursor is out of
    /// range, a stack is empty or its cursor is out of range, or an action
    /// record names an id without a stack. Returns [`HistoryError::InvalidId`]
    /// for a stack id that could not appear in an action record.
    pub fn restore(snapshot: HistorySnapshot) -> Result<Self, HistoryError> {
        let HistorySnapshot { cursor_index, action_log, stacks } = snapshot;

        for (id, stack) in &stacks {
            validate_id(id)?;
            if !stack.is_consistent(id) {
                return Err(HistoryError::CorruptSnapshot(format!(
                    "stack {id:?} is empty, has its cursor out of range, or holds another entity"
                )));
            }
        }

        let log: Vec<ActionRecord> = action_log.iter().map(|encoded| ActionRecord::decode(encoded)).collect();
        if let Some(id) = log.iter().flat_map(|r| &r.ids).find(|id| !stacks.contains_key(*id)) {
            return Err(HistoryError::CorruptSnapshot(format!(
                "action record references unregistered entity {id:?}"
            )));
        }

        let cursor = match cursor_index {
            -1 => None,
            index => match usize::try_from(index) {
                Ok(index) if index < log.len() => Some(index),
                _ => {
                    return Err(HistoryError::CorruptSnapshot(format!(
                        "cursor {index} outside log of {} records",
                        log.len()
                    )));
                }
            },
        };

        Ok(Self {
            stacks: stacks.into_iter().collect(),
            log,
            cursor,
            redo_budget: 0,
            sink: None,
        })
    }

    // --- Queries ---

    /// Index of the newest applied action record, `None` when nothing is applied.
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    #[must_use]
    pub fn log(&self) -> &[ActionRecord] {
        &self.log
    }

    /// Number of undos available to redo.
    #[must_use]
    pub fn redo_budget(&self) -> usize {
        self.redo_budget
    }

    #[must_use]
    pub fn stack(&self, id: &str) -> Option<&VersionStack> {
        self.stacks.get(id)
    }

    #[must_use]
    pub fn is_registered(&self, id: &str) -> bool {
        self.stacks.contains_key(id)
    }

    /// The snapshot under an entity's stack cursor.
    #[must_use]
    pub fn current(&self, id: &str) -> Option<&Feature> {
        self.stacks.get(id).and_then(VersionStack::current)
    }

    /// `false` when nothing is applied or every entity in the newest applied
    /// record is already at its base.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        let Some(record) = self.cursor.and_then(|c| self.log.get(c)) else {
            return false;
        };
        record.ids.iter().any(|id| self.stacks.get(id).is_none_or(|s| s.index() > 0))
    }

    /// `false` when nothing has been undone since the last push or the cursor
    /// is at the newest record.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.redo_budget > 0 && self.next_index() < self.log.len()
    }

    /// Every entity touched by an applied record, classified against its base.
    ///
    /// Entities appear once, in order of first appearance in the log. Entities
    /// at their base, entities absent at both ends, and drafts are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::UnregisteredEntity`] when an applied record
    /// names an id without a stack.
    pub fn current_state(&self) -> Result<Vec<PendingChange>, HistoryError> {
        let Some(cursor) = self.cursor else {
            return Ok(Vec::new());
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut pending = Vec::new();
        for id in self.log.iter().take(cursor + 1).flat_map(|r| &r.ids) {
            if is_draft(id) || !seen.insert(id.as_str()) {
                continue;
            }
            let stack = self.stacks.get(id).ok_or_else(|| HistoryError::UnregisteredEntity(id.clone()))?;
            if stack.index() == 0 {
                continue;
            }
            let (Some(base), Some(current)) = (stack.base(), stack.current()) else {
                continue;
            };
            let op = match (base.has_geometry(), current.has_geometry()) {
                (false, true) => ChangeOp::Add,
                (true, true) => ChangeOp::Update,
                (true, false) => ChangeOp::Delete,
                (false, false) => continue,
            };
            pending.push(PendingChange { op, feature: current.clone() });
        }
        Ok(pending)
    }

    /// The store as its persisted layout.
    #[must_use]
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            cursor_index: self.cursor.map_or(-1, |c| i64::try_from(c).unwrap_or(i64::MAX)),
            action_log: self.log.iter().map(ActionRecord::encode).collect(),
            stacks: self.stacks.iter().map(|(id, stack)| (id.clone(), stack.clone())).collect(),
        }
    }

    // --- Mutations ---

    /// Record one user operation touching `features`.
    ///
    /// With `is_base` set, features without a stack are registered with their
    /// own state as base and nothing else happens. Otherwise every feature is
    /// snapshotted as one action record, truncating forward history.
    ///
    /// Duplicate ids collapse to one entry: first-seen order, last value wins.
    /// An empty push is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidId`] for an empty id or one containing
    /// `#`. Nothing is recorded in that case.
    pub fn push(&mut self, annotation: &str, features: &[Feature], is_base: bool) -> Result<(), HistoryError> {
        let features = collapse_duplicates(features);
        for feature in &features {
            validate_id(&feature.id)?;
        }
        if features.is_empty() {
            return Ok(());
        }

        if is_base {
            for feature in features {
                self.register(feature);
            }
            return Ok(());
        }

        self.log.truncate(self.next_index());
        let mut ids = Vec::with_capacity(features.len());
        for feature in features {
            self.fold_draft(&draft_id(&feature.id));
            let stack = self
                .stacks
                .entry(feature.id.clone())
                .or_insert_with(|| VersionStack::with_base(StackItem::new(BASE_ANNOTATION, feature.ghost())));
            ids.push(feature.id.clone());
            stack.push(StackItem::new(annotation, feature));
        }

        debug!(annotation, ids = ?ids, "history push");
        self.log.push(ActionRecord { ids });
        self.cursor = Some(self.log.len() - 1);
        self.redo_budget = 0;
        self.persist();
        Ok(())
    }

    /// Step back over the newest applied record.
    ///
    /// Returns one change per entity that moved; empty when undo is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::UnregisteredEntity`] when the record names an id
    /// without a stack. Nothing is applied in that case.
    pub fn undo(&mut self) -> Result<Vec<HistoryChange>, HistoryError> {
        if !self.can_undo() {
            return Ok(Vec::new());
        }
        let Some(cursor) = self.cursor else {
            return Ok(Vec::new());
        };
        let ids = self.record_ids(cursor)?;

        let mut changes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((from, to)) = self.stacks.get_mut(&id).and_then(VersionStack::step_back) {
                let change = HistoryChange::between(id, from, to);
                changes.push(change);
            }
        }

        self.cursor = cursor.checked_sub(1);
        self.redo_budget += 1;
        debug!(cursor = ?self.cursor, changes = changes.len(), "history undo");
        self.persist();
        Ok(changes)
    }

    /// Re-apply the record just above the cursor.
    ///
    /// Returns one change per entity that moved; empty when redo is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::UnregisteredEntity`] when the record names an id
    /// without a stack. Nothing is applied in that case.
    pub fn redo(&mut self) -> Result<Vec<HistoryChange>, HistoryError> {
        if !self.can_redo() {
            return Ok(Vec::new());
        }
        let next = self.next_index();
        let ids = self.record_ids(next)?;

        let mut changes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((from, to)) = self.stacks.get_mut(&id).and_then(VersionStack::step_forward) {
                let change = HistoryChange::between(id, from, to);
                changes.push(change);
            }
        }

        self.cursor = Some(next);
        self.redo_budget -= 1;
        debug!(cursor = next, changes = changes.len(), "history redo");
        self.persist();
        Ok(changes)
    }

    /// Register pre-existing features with their own state as base,
    /// optionally wiping the store and its durable snapshot first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidId`] as [`HistoryStore::push`] does.
    pub fn initial(&mut self, features: &[Feature], clear_first: bool) -> Result<(), HistoryError> {
        if clear_first {
            self.clear();
        }
        self.push(BASE_ANNOTATION, features, true)
    }

    /// Forget everything and erase the durable snapshot.
    pub fn clear(&mut self) {
        self.stacks.clear();
        self.log.clear();
        self.cursor = None;
        self.redo_budget = 0;
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.erase() {
                warn!(error = %err, "history snapshot erase failed");
            }
        }
        debug!("history cleared");
    }

    /// Drop a draft's stack and every record of it without finishing it.
    ///
    /// Returns `false` when `draft` is not a draft id or has no stack.
    pub fn discard_draft(&mut self, draft: &str) -> bool {
        if !is_draft(draft) || !self.fold_draft(draft) {
            return false;
        }
        self.persist();
        true
    }

    /// Drop every draft left in the store, as after restoring a snapshot
    /// written mid-draw. Returns how many drafts were dropped.
    pub fn discard_drafts(&mut self) -> usize {
        let mut drafts: Vec<FeatureId> = self.stacks.keys().filter(|id| is_draft(id)).cloned().collect();
        drafts.sort();
        let mut dropped = 0;
        for draft in &drafts {
            if self.fold_draft(draft) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.persist();
        }
        dropped
    }

    // --- Internals ---

    fn next_index(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    fn register(&mut self, feature: Feature) {
        self.stacks
            .entry(feature.id.clone())
            .or_insert_with(|| VersionStack::with_base(StackItem::new(BASE_ANNOTATION, feature)));
    }

    /// The ids of record `index`, checked against the registered stacks.
    fn record_ids(&self, index: usize) -> Result<Vec<FeatureId>, HistoryError> {
        let Some(record) = self.log.get(index) else {
            return Ok(Vec::new());
        };
        if let Some(id) = record.ids.iter().find(|id| !self.stacks.contains_key(*id)) {
            return Err(HistoryError::UnregisteredEntity(id.clone()));
        }
        Ok(record.ids.clone())
    }

    /// Remove `draft`'s stack and strip it from the log. Returns `false` when
    /// it has no stack.
    fn fold_draft(&mut self, draft: &str) -> bool {
        if self.stacks.remove(draft).is_none() {
            return false;
        }

        let cursor = self.cursor;
        let mut removed_applied = 0;
        let mut kept = Vec::with_capacity(self.log.len());
        for (index, mut record) in std::mem::take(&mut self.log).into_iter().enumerate() {
            record.ids.retain(|id| id != draft);
            if !record.ids.is_empty() {
                kept.push(record);
            } else if cursor.is_some_and(|c| index <= c) {
                removed_applied += 1;
            }
        }
        self.log = kept;
        self.cursor = cursor.and_then(|c| c.checked_sub(removed_applied));
        self.redo_budget = self.redo_budget.min(self.log.len().saturating_sub(self.next_index()));
        debug!(draft, cursor = ?self.cursor, "draft folded");
        true
    }

    fn persist(&mut self) {
        if self.sink.is_none() {
            return;
        }
        let snapshot = self.snapshot();
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.write(&snapshot) {
                warn!(error = %err, "history snapshot write failed");
            }
        }
    }
}

fn validate_id(id: &str) -> Result<(), HistoryError> {
    if id.is_empty() || id.contains(RECORD_SEPARATOR) {
        return Err(HistoryError::InvalidId(id.to_owned()));
    }
    Ok(())
}

fn collapse_duplicates(features: &[Feature]) -> Vec<Feature> {
    let mut collapsed: Vec<Feature> = Vec::with_capacity(features.len());
    for feature in features {
        match collapsed.iter_mut().find(|f| f.id == feature.id) {
            Some(slot) => *slot = feature.clone(),
            None => collapsed.push(feature.clone()),
        }
    }
    collapsed
}
