//! Editor coordinator: the visible layer, the history store, and tool modes.
//!
//! Every user operation follows the same shape. Pre-existing features are
//! first registered with the history store as their own base (a base push),
//! then the operation's result is pushed as one action record and applied to
//! the layer. Undo and redo hand back [`HistoryChange`]s that are applied to
//! the layer the same way a host would: remove when the new value is absent,
//! upsert otherwise. Draft changes update the in-progress drawing instead.
//!
//! ## Tool gating
//!
//! | Action | Blocked in | Selection |
//! |--------|------------|-----------|
//! | edit | clip | exactly 1 |
//! | split | edit | exactly 1 |
//! | merge | edit, clip | at least 2 |
//! | delete, shake | edit, clip | at least 1 |

#[cfg(test)]
#[path = "editor_test.rs"]
mod editor_test;

use std::collections::HashSet;
use std::fmt;

use geometry::consts::SPLIT_BUFFER_KM;
use geometry::feature::new_feature_id;
use geometry::{
    Feature, FeatureId, Geometry, GeometryError, NestedCoords, Position, Projector, boundary_clip, get_snap,
    merge_with_hole_resolution, normalize_to_multipolygon, point_in_boundary, shake_feature, split_by_line,
};
use history::{
    FileSnapshotSink, HistoryChange, HistoryError, HistoryStore, PendingChange, PersistError, draft_id, finished_id,
    is_draft,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::geojson::{ImportError, parse_features, to_feature_collection};
use crate::layer::FeatureLayer;

/// The active tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    #[default]
    Browse,
    Draw,
    Clip,
    Merge,
    Edit,
}

impl ToolMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browse => "browse",
            Self::Draw => "draw",
            Self::Clip => "clip",
            Self::Merge => "merge",
            Self::Edit => "edit",
        }
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toolbar actions gated on mode and selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    Edit,
    Split,
    Merge,
    Delete,
    Shake,
}

impl ToolAction {
    fn name(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Split => "split",
            Self::Merge => "merge",
            Self::Delete => "delete",
            Self::Shake => "shake",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Draw,
    Edit,
    Delete,
    Split,
    Merge,
    Import,
    Shake,
}

/// What one operation did to the layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    /// Features as they were before, for every feature the operation touched.
    pub before: Vec<Feature>,
    /// Features the operation produced.
    pub after: Vec<Feature>,
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("{operation} is not available in {mode} mode")]
    WrongMode { operation: &'static str, mode: ToolMode },
    #[error("{operation} needs {expected} selected features, found {found}")]
    Selection { operation: &'static str, expected: &'static str, found: usize },
    #[error("unknown feature {0:?}")]
    UnknownFeature(FeatureId),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone)]
struct Draft {
    id: FeatureId,
    points: Vec<Position>,
}

/// Editing session over one feature layer.
#[derive(Debug)]
pub struct Editor {
    config: EditorConfig,
    layer: FeatureLayer,
    history: HistoryStore,
    boundary: Option<Geometry>,
    mode: ToolMode,
    selection: Vec<FeatureId>,
    draft: Option<Draft>,
    cut_line: Vec<Position>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    /// An editor with in-memory history only.
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            layer: FeatureLayer::new(),
            history: HistoryStore::new(),
            boundary: None,
            mode: ToolMode::Browse,
            selection: Vec::new(),
            draft: None,
            cut_line: Vec::new(),
        }
    }

    /// An editor whose history is kept at `config.snapshot_path`, restored
    /// from it when a snapshot is already there.
    ///
    /// Drafts left in the snapshot by a session that ended mid-draw are
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Persist`] when an existing snapshot cannot be
    /// read and [`EditorError::History`] when it is inconsistent.
    pub fn open(config: EditorConfig) -> Result<Self, EditorError> {
        let Some(path) = config.snapshot_path.clone() else {
            return Ok(Self::new(config));
        };
        let sink = FileSnapshotSink::new(path);
        let history = match sink.load()? {
            Some(snapshot) => {
                info!(path = %sink.path().display(), "history restored");
                HistoryStore::restore(snapshot)?
            }
            None => HistoryStore::new(),
        };
        let mut history = history.with_sink(Box::new(sink));
        let dropped = history.discard_drafts();
        if dropped > 0 {
            info!(dropped, "unfinished drafts discarded");
        }
        Ok(Self::new(config).with_history(history))
    }

    #[must_use]
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = history;
        self
    }

    /// Restrict drawing and editing to `boundary`.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Option<Geometry>) -> Self {
        self.boundary = boundary.filter(|b| !b.is_empty());
        self
    }

    /// Replace the layer with host-supplied features and register them with
    /// history as their own base.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::History`] for an id the history store rejects.
    pub fn load(&mut self, features: Vec<Feature>, clear_history: bool) -> Result<(), EditorError> {
        self.layer.load(features);
        self.selection.clear();
        self.history.initial(self.layer.features(), clear_history)?;
        info!(features = self.layer.len(), clear_history, "layer loaded");
        Ok(())
    }

    // --- Queries ---

    #[must_use]
    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    #[must_use]
    pub fn layer(&self) -> &FeatureLayer {
        &self.layer
    }

    #[must_use]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    #[must_use]
    pub fn boundary(&self) -> Option<&Geometry> {
        self.boundary.as_ref()
    }

    #[must_use]
    pub fn selection(&self) -> &[FeatureId] {
        &self.selection
    }

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Placed points of the polygon being drawn.
    #[must_use]
    pub fn draft_points(&self) -> &[Position] {
        self.draft.as_ref().map_or(&[], |d| d.points.as_slice())
    }

    #[must_use]
    pub fn draft_id(&self) -> Option<&str> {
        self.draft.as_ref().map(|d| d.id.as_str())
    }

    #[must_use]
    pub fn cut_line(&self) -> &[Position] {
        &self.cut_line
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    #[must_use]
    pub fn is_enabled(&self, action: ToolAction) -> bool {
        self.check(action).is_ok()
    }

    /// Unsaved changes against each feature's base.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::History`] when the history log is inconsistent.
    pub fn pending_changes(&self) -> Result<Vec<PendingChange>, EditorError> {
        Ok(self.history.current_state()?)
    }

    /// The selected features as a `FeatureCollection`, or every feature when
    /// nothing is selected.
    #[must_use]
    pub fn export(&self) -> Value {
        if self.selection.is_empty() {
            return to_feature_collection(self.layer.features());
        }
        let selected: Vec<Feature> =
            self.layer.features().iter().filter(|f| self.selection.contains(&f.id)).cloned().collect();
        to_feature_collection(&selected)
    }

    // --- Mode and selection ---

    /// Switch tools. Leaving draw mode discards the drawing in progress and
    /// leaving clip mode drops the cut line.
    ///
    /// # Errors
    ///
    /// Entering edit or clip mode needs exactly one selected feature.
    pub fn set_mode(&mut self, mode: ToolMode) -> Result<(), EditorError> {
        if mode == self.mode {
            return Ok(());
        }
        match mode {
            ToolMode::Edit => self.check(ToolAction::Edit)?,
            ToolMode::Clip => self.check(ToolAction::Split)?,
            _ => {}
        }
        if self.mode == ToolMode::Draw {
            self.cancel_draw();
        }
        self.cut_line.clear();
        debug!(from = %self.mode, to = %mode, "mode changed");
        self.mode = mode;
        Ok(())
    }

    /// Select the given ids, ignoring any not on the layer.
    pub fn select(&mut self, ids: &[FeatureId]) {
        let mut selection: Vec<FeatureId> = Vec::with_capacity(ids.len());
        for id in ids {
            if self.layer.contains(id) && !selection.contains(id) {
                selection.push(id.clone());
            }
        }
        self.selection = selection;
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // --- Drawing ---

    /// Place the next point of the polygon being drawn.
    ///
    /// Inside the boundary the point snaps to nearby vertices and edges of
    /// existing features. Outside it, the point is pulled onto the nearest
    /// point of the boundary itself. Every placed point is recorded as a
    /// draft snapshot, so it can be undone on its own.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] outside draw mode.
    pub fn add_draw_point<P: Projector + ?Sized>(&mut self, projector: &P, point: Position) -> Result<Position, EditorError> {
        self.require_mode("draw", ToolMode::Draw)?;
        let snapped = self.snap_draw_point(projector, point);

        let id = match &self.draft {
            Some(draft) => draft.id.clone(),
            None => draft_id(&new_feature_id()),
        };
        let mut points = self.draft.as_ref().map(|d| d.points.clone()).unwrap_or_default();
        points.push(snapped);

        let snapshot = Feature::from_coords(id.clone(), vec![vec![points.clone()]]);
        self.history.push("draw point", &[snapshot], false)?;
        self.draft = Some(Draft { id, points });
        Ok(snapped)
    }

    /// The drawing as it would look with the pointer at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] outside draw mode.
    pub fn preview_draw<P: Projector + ?Sized>(&self, projector: &P, cursor: Position) -> Result<Vec<Position>, EditorError> {
        self.require_mode("draw", ToolMode::Draw)?;
        let mut points = self.draft_points().to_vec();
        points.push(self.snap_draw_point(projector, cursor));
        Ok(points)
    }

    /// Close the drawing into a feature.
    ///
    /// Needs at least three points with the last one inside the boundary;
    /// otherwise nothing happens and drawing continues. The polygon is
    /// clipped to the boundary and takes the draft's id without its prefix.
    /// Without continuous drawing the editor returns to browse mode with the
    /// new feature selected.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] outside draw mode and
    /// [`EditorError::Geometry`] for non-finite points.
    pub fn finish_draw(&mut self) -> Result<Option<Change>, EditorError> {
        self.require_mode("finish drawing", ToolMode::Draw)?;
        let Some(draft) = self.draft.as_ref() else {
            return Ok(None);
        };
        let Some(&last) = draft.points.last() else {
            return Ok(None);
        };
        if draft.points.len() < 3 || !point_in_boundary(last, self.boundary.as_ref()) {
            return Ok(None);
        }

        let id = finished_id(&draft.id).unwrap_or(&draft.id).to_owned();
        let geometry = normalize_to_multipolygon(&NestedCoords::Ring(draft.points.clone()))?;
        let feature = boundary_clip(&Feature::new(id.clone(), Some(geometry), Map::new()), self.boundary.as_ref());
        if !feature.has_geometry() {
            debug!(%id, "drawn polygon lies outside the boundary");
            self.cancel_draw();
            return Ok(None);
        }

        self.history.push(&format!("draw finish {id}"), &[feature.clone()], false)?;
        self.layer.upsert(feature.clone());
        self.draft = None;
        if !self.config.continuous_draw {
            self.mode = ToolMode::Browse;
            self.selection = vec![id.clone()];
        }
        info!(%id, "polygon drawn");
        Ok(Some(Change { kind: ChangeKind::Draw, before: Vec::new(), after: vec![feature] }))
    }

    /// Abandon the drawing in progress and forget its history.
    pub fn cancel_draw(&mut self) -> bool {
        let Some(draft) = self.draft.take() else {
            return false;
        };
        self.history.discard_draft(&draft.id)
    }

    fn snap_draw_point<P: Projector + ?Sized>(&self, projector: &P, point: Position) -> Position {
        match &self.boundary {
            Some(boundary) if !point_in_boundary(point, Some(boundary)) => {
                let fence = Feature::new(FeatureId::new(), Some(boundary.clone()), Map::new());
                get_snap(projector, &[fence], point, f64::INFINITY, false).map_or(point, |s| s.lnglat)
            }
            _ => get_snap(projector, self.layer.features(), point, self.config.snap_threshold_px, false)
                .map_or(point, |s| s.lnglat),
        }
    }

    // --- Cutting ---

    /// Place the next point of the cut line, snapped to existing features.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] outside clip mode.
    pub fn add_cut_point<P: Projector + ?Sized>(&mut self, projector: &P, point: Position) -> Result<Position, EditorError> {
        self.require_mode("cut", ToolMode::Clip)?;
        let snapped = get_snap(projector, self.layer.features(), point, self.config.snap_threshold_px, false)
            .map_or(point, |s| s.lnglat);
        self.cut_line.push(snapped);
        Ok(snapped)
    }

    /// Split the selected feature along the cut line drawn so far.
    ///
    /// # Errors
    ///
    /// As [`Editor::split_selected`], plus [`EditorError::WrongMode`] outside
    /// clip mode.
    pub fn finish_cut(&mut self) -> Result<Option<Change>, EditorError> {
        self.require_mode("finish cut", ToolMode::Clip)?;
        let line = std::mem::take(&mut self.cut_line);
        self.split_selected(&line)
    }

    /// Split the one selected feature along `line`.
    ///
    /// The feature is replaced by the pieces in a single undoable step.
    /// A line that does not cut the feature into at least two pieces changes
    /// nothing. A split from clip mode returns to browse mode.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] or [`EditorError::Selection`] when
    /// splitting is not enabled.
    pub fn split_selected(&mut self, line: &[Position]) -> Result<Option<Change>, EditorError> {
        self.check(ToolAction::Split)?;
        let feature = self.selected_features()?.remove(0);
        let pieces = split_by_line(&feature, line, SPLIT_BUFFER_KM);
        if pieces.len() < 2 {
            debug!(id = %feature.id, pieces = pieces.len(), "cut line does not split feature");
            return Ok(None);
        }

        self.history.push(&format!("clip add base {}", feature.id), &[feature.clone()], true)?;
        let mut batch = vec![feature.ghost()];
        batch.extend(pieces.iter().cloned());
        self.history.push(&format!("clip {}", feature.id), &batch, false)?;

        self.layer.remove(&feature.id);
        for piece in &pieces {
            self.layer.upsert(piece.clone());
        }
        self.selection.clear();
        self.cut_line.clear();
        if self.mode == ToolMode::Clip {
            self.mode = ToolMode::Browse;
        }
        info!(id = %feature.id, pieces = pieces.len(), "feature split");
        Ok(Some(Change { kind: ChangeKind::Split, before: vec![feature], after: pieces }))
    }

    // --- Whole-feature operations ---

    /// Merge the selected features into one, resolving holes first.
    ///
    /// The merged feature is selected afterwards. Inputs that produce no
    /// geometry change nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] or [`EditorError::Selection`] when
    /// merging is not enabled.
    pub fn merge_selected(&mut self) -> Result<Option<Change>, EditorError> {
        self.check(ToolAction::Merge)?;
        let features = self.selected_features()?;
        let Some(merged) = merge_with_hole_resolution(&features) else {
            return Ok(None);
        };

        let ids: Vec<&str> = features.iter().map(|f| f.id.as_str()).collect();
        let annotation = format!("merge {}", ids.join(","));
        self.history.push(&format!("{annotation} add base"), &features, true)?;
        let mut batch: Vec<Feature> = features.iter().map(Feature::ghost).collect();
        batch.push(merged.clone());
        self.history.push(&annotation, &batch, false)?;

        for feature in &features {
            self.layer.remove(&feature.id);
        }
        self.layer.upsert(merged.clone());
        self.selection = vec![merged.id.clone()];
        info!(merged = %merged.id, inputs = features.len(), "features merged");
        Ok(Some(Change { kind: ChangeKind::Merge, before: features, after: vec![merged] }))
    }

    /// Delete every selected feature as one undoable step.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] or [`EditorError::Selection`] when
    /// deleting is not enabled.
    pub fn delete_selected(&mut self) -> Result<Change, EditorError> {
        self.check(ToolAction::Delete)?;
        let features = self.selected_features()?;

        self.history.push("delete add base", &features, true)?;
        let ghosts: Vec<Feature> = features.iter().map(Feature::ghost).collect();
        self.history.push("delete", &ghosts, false)?;

        for feature in &features {
            self.layer.remove(&feature.id);
        }
        self.selection.clear();
        info!(count = features.len(), "features deleted");
        Ok(Change { kind: ChangeKind::Delete, before: features, after: Vec::new() })
    }

    /// Replace the selected feature's geometry.
    ///
    /// Geometry reaching outside the boundary is clipped to it. An edit that
    /// leaves nothing inside the boundary changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] or [`EditorError::Selection`] when
    /// editing is not enabled and [`EditorError::Geometry`] for malformed
    /// coordinates.
    pub fn edit_selected(&mut self, coords: &NestedCoords) -> Result<Option<Change>, EditorError> {
        self.check(ToolAction::Edit)?;
        let current = self.selected_features()?.remove(0);
        let geometry = normalize_to_multipolygon(coords)?;
        let edited = boundary_clip(&current.with_geometry(geometry), self.boundary.as_ref());
        if !edited.has_geometry() {
            debug!(id = %current.id, "edit left nothing inside the boundary");
            return Ok(None);
        }

        self.history.push(&format!("edit add base {}", current.id), &[current.clone()], true)?;
        self.history.push(&format!("edit {}", current.id), &[edited.clone()], false)?;
        self.layer.upsert(edited.clone());
        debug!(id = %current.id, "feature edited");
        Ok(Some(Change { kind: ChangeKind::Edit, before: vec![current], after: vec![edited] }))
    }

    /// Add imported features, renaming ids that are empty, already on the
    /// layer, or unusable in history. The imports become the selection.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::History`] when the import cannot be recorded.
    pub fn import(&mut self, features: Vec<Feature>) -> Result<Option<Change>, EditorError> {
        if features.is_empty() {
            return Ok(None);
        }
        let mut taken: HashSet<FeatureId> = self.layer.ids().cloned().collect();
        let mut imported = Vec::with_capacity(features.len());
        for mut feature in features {
            if feature.id.is_empty() || feature.id.contains('#') || is_draft(&feature.id) || taken.contains(&feature.id) {
                feature.id = new_feature_id();
            }
            taken.insert(feature.id.clone());
            imported.push(feature);
        }

        self.history.push("import", &imported, false)?;
        for feature in &imported {
            self.layer.upsert(feature.clone());
        }
        self.selection = imported.iter().map(|f| f.id.clone()).collect();
        info!(count = imported.len(), "features imported");
        Ok(Some(Change { kind: ChangeKind::Import, before: Vec::new(), after: imported }))
    }

    /// Parse GeoJSON text and import its polygon features.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Import`] when the text is not usable GeoJSON.
    pub fn import_geojson(&mut self, text: &str) -> Result<Option<Change>, EditorError> {
        let features = parse_features(text)?;
        self.import(features)
    }

    // --- Snap to neighbours ---

    /// For every selected feature, its snapped counterpart. Features with
    /// nothing within the shake threshold are left out.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::WrongMode`] or [`EditorError::Selection`] when
    /// shaking is not enabled.
    pub fn plan_shake<P: Projector + ?Sized>(&self, projector: &P) -> Result<Vec<(Feature, Feature)>, EditorError> {
        self.check(ToolAction::Shake)?;
        let threshold = self.config.shake_threshold_px;
        Ok(self
            .selected_features()?
            .into_iter()
            .filter_map(|feature| {
                let neighbours = self.layer.others(&feature.id);
                shake_feature(projector, &feature, &neighbours, threshold).map(|shaken| (feature, shaken))
            })
            .collect())
    }

    /// Commit a snapped feature produced by [`Editor::plan_shake`].
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::UnknownFeature`] when the feature has left the
    /// layer since it was planned.
    pub fn apply_shake(&mut self, shaken: Feature) -> Result<Change, EditorError> {
        let current = self.layer.get(&shaken.id).cloned().ok_or_else(|| EditorError::UnknownFeature(shaken.id.clone()))?;
        self.history.push(&format!("shake add base {}", current.id), &[current.clone()], true)?;
        self.history.push(&format!("shake {}", current.id), &[shaken.clone()], false)?;
        self.layer.upsert(shaken.clone());
        debug!(id = %current.id, "feature shaken");
        Ok(Change { kind: ChangeKind::Shake, before: vec![current], after: vec![shaken] })
    }

    /// Snap every selected feature to its neighbours at once.
    ///
    /// # Errors
    ///
    /// As [`Editor::plan_shake`].
    pub fn shake_selected<P: Projector + ?Sized>(&mut self, projector: &P) -> Result<Vec<Change>, EditorError> {
        let plan = self.plan_shake(projector)?;
        plan.into_iter().map(|(_, shaken)| self.apply_shake(shaken)).collect()
    }

    // --- Undo / redo ---

    /// Undo the newest operation and apply it to the layer.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::History`] when the history log is inconsistent;
    /// nothing is applied in that case.
    pub fn undo(&mut self) -> Result<Vec<HistoryChange>, EditorError> {
        let changes = self.history.undo()?;
        self.apply_history(&changes);
        Ok(changes)
    }

    /// Redo the most recently undone operation and apply it to the layer.
    ///
    /// # Errors
    ///
    /// As [`Editor::undo`].
    pub fn redo(&mut self) -> Result<Vec<HistoryChange>, EditorError> {
        let changes = self.history.redo()?;
        self.apply_history(&changes);
        Ok(changes)
    }

    fn apply_history(&mut self, changes: &[HistoryChange]) {
        for change in changes {
            if is_draft(&change.id) {
                if self.mode != ToolMode::Draw {
                    continue;
                }
                let points = change
                    .new_value
                    .as_ref()
                    .and_then(|f| f.geometry.as_ref())
                    .and_then(|g| g.coordinates.first())
                    .and_then(|polygon| polygon.first())
                    .cloned()
                    .unwrap_or_default();
                self.draft = Some(Draft { id: change.id.clone(), points });
                continue;
            }
            match &change.new_value {
                Some(feature) => self.layer.upsert(feature.clone()),
                None => {
                    if self.layer.remove(&change.id).is_some() {
                        self.selection.retain(|id| id != &change.id);
                    }
                }
            }
        }
    }

    // --- Internals ---

    fn require_mode(&self, operation: &'static str, mode: ToolMode) -> Result<(), EditorError> {
        if self.mode != mode {
            return Err(EditorError::WrongMode { operation, mode: self.mode });
        }
        Ok(())
    }

    fn check(&self, action: ToolAction) -> Result<(), EditorError> {
        let found = self.selection.len();
        let (blocked, selection_ok, expected): (&[ToolMode], bool, &'static str) = match action {
            ToolAction::Edit => (&[ToolMode::Clip], found == 1, "exactly 1"),
            ToolAction::Split => (&[ToolMode::Edit], found == 1, "exactly 1"),
            ToolAction::Merge => (&[ToolMode::Edit, ToolMode::Clip], found >= 2, "at least 2"),
            ToolAction::Delete | ToolAction::Shake => (&[ToolMode::Edit, ToolMode::Clip], found >= 1, "at least 1"),
        };
        if blocked.contains(&self.mode) {
            return Err(EditorError::WrongMode { operation: action.name(), mode: self.mode });
        }
        if !selection_ok {
            return Err(EditorError::Selection { operation: action.name(), expected, found });
        }
        Ok(())
    }

    fn selected_features(&self) -> Result<Vec<Feature>, EditorError> {
        self.selection
            .iter()
            .map(|id| self.layer.get(id).cloned().ok_or_else(|| EditorError::UnknownFeature(id.clone())))
            .collect()
    }
}
