use super::*;
use std::io;
use std::sync::{Arc, Mutex};

use crate::snapshot::PersistError;

fn poly(id: &str, x: f64) -> Feature {
    Feature::from_coords(id, vec![vec![vec![[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0], [x, 0.0]]]])
}

fn ids(store: &HistoryStore) -> Vec<Vec<&str>> {
    store
        .log()
        .iter()
        .map(|r| r.ids().iter().map(String::as_str).collect())
        .collect()
}

#[derive(Clone, Default)]
struct RecordingSink {
    writes: Arc<Mutex<Vec<HistorySnapshot>>>,
    erases: Arc<Mutex<usize>>,
}

impl SnapshotSink for RecordingSink {
    fn write(&mut self, snapshot: &HistorySnapshot) -> Result<(), PersistError> {
        self.writes.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    fn erase(&mut self) -> Result<(), PersistError> {
        *self.erases.lock().unwrap() += 1;
        Ok(())
    }
}

struct FailingSink;

impl SnapshotSink for FailingSink {
    fn write(&mut self, _snapshot: &HistorySnapshot) -> Result<(), PersistError> {
        Err(PersistError::Io(io::Error::other("disk full")))
    }

    fn erase(&mut self) -> Result<(), PersistError> {
        Err(PersistError::Io(io::Error::other("read-only")))
    }
}

// =============================================================
// Empty store
// =============================================================

#[test]
fn fresh_store_has_nothing_to_do() {
    let mut store = HistoryStore::new();
    assert!(!store.can_undo());
    assert!(!store.can_redo());
    assert_eq!(store.cursor(), None);
    assert!(store.undo().unwrap().is_empty());
    assert!(store.redo().unwrap().is_empty());
    assert!(store.current_state().unwrap().is_empty());
}

// =============================================================
// push
// =============================================================

#[test]
fn push_seeds_ghost_base_for_new_entity() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();

    let Some(stack) = store.stack("a") else {
        panic!("stack missing");
    };
    assert_eq!(stack.items().len(), 2);
    assert_eq!(stack.index(), 1);
    assert_eq!(stack.items()[0].annotation, BASE_ANNOTATION);
    assert_eq!(stack.base().and_then(|f| f.geometry.as_ref()), None);
    assert_eq!(store.cursor(), Some(0));
    assert!(store.can_undo());
    assert!(!store.can_redo());
}

#[test]
fn push_records_one_action_for_all_features() {
    let mut store = HistoryStore::new();
    store.push("split", &[poly("a", 0.0).ghost(), poly("b", 0.0), poly("c", 1.0)], false).unwrap();
    assert_eq!(ids(&store), vec![vec!["a", "b", "c"]]);
}

#[test]
fn duplicate_ids_collapse_last_value_wins() {
    let mut store = HistoryStore::new();
    store.push("edit", &[poly("a", 0.0), poly("b", 0.0), poly("a", 5.0)], false).unwrap();
    assert_eq!(ids(&store), vec![vec!["a", "b"]]);
    assert_eq!(store.current("a"), Some(&poly("a", 5.0)));
    assert_eq!(store.stack("a").map(|s| s.items().len()), Some(2));
}

#[test]
fn base_push_registers_without_recording() {
    let mut store = HistoryStore::new();
    store.push("add base", &[poly("a", 0.0)], true).unwrap();
    assert!(store.log().is_empty());
    assert_eq!(store.cursor(), None);
    assert!(!store.can_undo());
    assert_eq!(store.stack("a").and_then(VersionStack::base), Some(&poly("a", 0.0)));
}

#[test]
fn base_push_leaves_existing_stack_alone() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("add base", &[poly("a", 9.0)], true).unwrap();
    assert_eq!(store.current("a"), Some(&poly("a", 0.0)));
    assert_eq!(store.stack("a").map(|s| s.items().len()), Some(2));
}

#[test]
fn base_push_keeps_redo_budget() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.undo().unwrap();
    store.push("add base", &[poly("b", 0.0)], true).unwrap();
    assert!(store.can_redo());
}

#[test]
fn empty_push_is_noop() {
    let mut store = HistoryStore::new();
    store.push("draw", &[], false).unwrap();
    assert!(store.log().is_empty());
    assert_eq!(store.cursor(), None);
}

#[test]
fn invalid_ids_are_rejected_without_side_effects() {
    let mut store = HistoryStore::new();
    let bad = poly("a#b", 0.0);
    assert_eq!(
        store.push("draw", &[poly("c", 0.0), bad], false),
        Err(HistoryError::InvalidId("a#b".to_owned()))
    );
    assert!(store.log().is_empty());
    assert!(!store.is_registered("c"));

    assert_eq!(store.push("draw", &[poly("", 0.0)], false), Err(HistoryError::InvalidId(String::new())));
}

// =============================================================
// undo / redo
// =============================================================

#[test]
fn undo_undo_redo_restores_first_feature() {
    let p1 = poly("p1", 0.0);
    let p2 = poly("p2", 2.0);
    let mut store = HistoryStore::new();
    store.push("draw", std::slice::from_ref(&p1), false).unwrap();
    store.push("draw", std::slice::from_ref(&p2), false).unwrap();

    let first = store.undo().unwrap();
    assert_eq!(
        first,
        vec![HistoryChange { id: "p2".into(), old_value: Some(p2.clone()), new_value: None }]
    );

    let second = store.undo().unwrap();
    assert_eq!(
        second,
        vec![HistoryChange { id: "p1".into(), old_value: Some(p1.clone()), new_value: None }]
    );
    assert!(!store.can_undo());
    assert_eq!(store.cursor(), None);

    let redone = store.redo().unwrap();
    assert_eq!(
        redone,
        vec![HistoryChange { id: "p1".into(), old_value: None, new_value: Some(p1) }]
    );
    assert_eq!(store.cursor(), Some(0));
    assert!(store.can_redo());

    store.redo().unwrap();
    assert!(!store.can_redo());
    assert_eq!(store.current("p2"), Some(&p2));
}

#[test]
fn undo_then_redo_is_round_trip() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("edit", &[poly("a", 3.0)], false).unwrap();

    let undone = store.undo().unwrap();
    assert_eq!(undone[0].old_value, Some(poly("a", 3.0)));
    assert_eq!(undone[0].new_value, Some(poly("a", 0.0)));

    let redone = store.redo().unwrap();
    assert_eq!(redone[0].old_value, Some(poly("a", 0.0)));
    assert_eq!(redone[0].new_value, Some(poly("a", 3.0)));
    assert_eq!(store.current("a"), Some(&poly("a", 3.0)));
}

#[test]
fn multi_entity_undo_moves_every_stack() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("split", &[poly("a", 0.0).ghost(), poly("b", 0.0), poly("c", 0.5)], false).unwrap();

    let changes = store.undo().unwrap();
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[0].id, "a");
    assert_eq!(changes[0].old_value, None);
    assert_eq!(changes[0].new_value, Some(poly("a", 0.0)));
    assert!(changes[1..].iter().all(|c| c.old_value.is_some() && c.new_value.is_none()));
}

#[test]
fn push_after_undo_disables_redo() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("edit", &[poly("a", 1.0)], false).unwrap();
    store.undo().unwrap();
    assert!(store.can_redo());

    store.push("edit", &[poly("a", 7.0)], false).unwrap();
    assert!(!store.can_redo());
    assert!(store.redo().unwrap().is_empty());
    let Some(stack) = store.stack("a") else {
        panic!("stack missing");
    };
    assert_eq!(stack.items().len(), 3);
    assert_eq!(stack.current(), Some(&poly("a", 7.0)));
}

#[test]
fn push_after_undo_drops_forward_records() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("draw", &[poly("b", 0.0)], false).unwrap();
    store.undo().unwrap();
    store.push("draw", &[poly("c", 0.0)], false).unwrap();

    assert_eq!(ids(&store), vec![vec!["a"], vec!["c"]]);
    assert_eq!(store.undo().unwrap()[0].id, "c");
    assert_eq!(store.undo().unwrap()[0].id, "a");
    assert!(!store.can_undo());
}

#[test]
fn redo_budget_counts_consecutive_undos() {
    let mut store = HistoryStore::new();
    for x in 0..3 {
        store.push("edit", &[poly("a", f64::from(x))], false).unwrap();
    }
    store.undo().unwrap();
    store.undo().unwrap();
    assert_eq!(store.redo_budget(), 2);
    store.redo().unwrap();
    assert_eq!(store.redo_budget(), 1);
    store.redo().unwrap();
    assert!(!store.can_redo());
}

#[test]
fn undo_is_disabled_when_record_is_at_base() {
    let mut stacks = std::collections::BTreeMap::new();
    let mut stack = VersionStack::with_base(StackItem::new(BASE_ANNOTATION, poly("a", 0.0).ghost()));
    stack.push(StackItem::new("draw", poly("a", 0.0)));
    assert!(stack.step_back().is_some());
    stacks.insert("a".to_owned(), stack);
    let mut store = HistoryStore::restore(HistorySnapshot {
        cursor_index: 0,
        action_log: vec!["a".into()],
        stacks,
    })
    .unwrap();

    assert!(!store.can_undo());
    assert!(store.undo().unwrap().is_empty());
    assert_eq!(store.cursor(), Some(0));
}

#[test]
fn unregistered_entity_aborts_without_partial_apply() {
    let mut store = HistoryStore::new();
    store.push("split", &[poly("a", 0.0), poly("b", 1.0)], false).unwrap();
    store.stacks.remove("b");

    assert!(store.can_undo());
    assert_eq!(store.undo(), Err(HistoryError::UnregisteredEntity("b".into())));
    assert_eq!(store.cursor(), Some(0));
    assert_eq!(store.stack("a").map(VersionStack::index), Some(1));
    assert_eq!(store.redo_budget(), 0);
    assert_eq!(store.current_state(), Err(HistoryError::UnregisteredEntity("b".into())));
}

#[test]
fn ghost_delete_round_trip() {
    let original = poly("a", 0.0);
    let mut store = HistoryStore::new();
    store.initial(std::slice::from_ref(&original), false).unwrap();
    store.push("delete", &[original.ghost()], false).unwrap();

    let undone = store.undo().unwrap();
    assert_eq!(undone[0].old_value, None);
    assert_eq!(undone[0].new_value, Some(original.clone()));

    let redone = store.redo().unwrap();
    assert_eq!(redone[0].old_value, Some(original));
    assert_eq!(redone[0].new_value, None);
}

#[test]
fn empty_coordinates_count_as_absent_in_changes() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("clip", &[Feature::from_coords("a", Vec::new())], false).unwrap();
    let undone = store.undo().unwrap();
    assert_eq!(undone[0].old_value, None);
    assert_eq!(undone[0].new_value, Some(poly("a", 0.0)));
}

// =============================================================
// current_state
// =============================================================

#[test]
fn current_state_classifies_against_base() {
    let mut store = HistoryStore::new();
    store.initial(&[poly("a", 0.0), poly("c", 4.0)], false).unwrap();
    store.push("edit", &[poly("a", 0.5)], false).unwrap();
    store.push("draw", &[poly("b", 2.0)], false).unwrap();
    store.push("delete", &[poly("c", 4.0).ghost()], false).unwrap();
    store.push("draw", &[poly("d", 6.0)], false).unwrap();
    store.push("delete", &[poly("d", 6.0).ghost()], false).unwrap();

    let state = store.current_state().unwrap();
    let summary: Vec<(ChangeOp, &str)> = state.iter().map(|p| (p.op, p.feature.id.as_str())).collect();
    assert_eq!(summary, vec![(ChangeOp::Update, "a"), (ChangeOp::Add, "b"), (ChangeOp::Delete, "c")]);
    assert_eq!(state[0].feature, poly("a", 0.5));
    assert_eq!(state[2].feature.geometry, None);
}

#[test]
fn current_state_stops_at_cursor() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("edit", &[poly("a", 1.0), poly("b", 2.0)], false).unwrap();
    store.undo().unwrap();

    let state = store.current_state().unwrap();
    assert_eq!(state, vec![PendingChange { op: ChangeOp::Add, feature: poly("a", 0.0) }]);
}

#[test]
fn current_state_lists_each_entity_once() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("edit", &[poly("a", 1.0)], false).unwrap();
    store.push("edit", &[poly("a", 2.0)], false).unwrap();
    let state = store.current_state().unwrap();
    assert_eq!(state, vec![PendingChange { op: ChangeOp::Add, feature: poly("a", 2.0) }]);
}

#[test]
fn current_state_skips_drafts() {
    let mut store = HistoryStore::new();
    store.push("draw point", &[poly("temp_x", 0.0)], false).unwrap();
    assert!(store.current_state().unwrap().is_empty());
}

// =============================================================
// Drafts
// =============================================================

#[test]
fn finishing_a_draft_folds_its_records() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("draw point", &[poly("temp_x", 1.0)], false).unwrap();
    store.push("draw point", &[poly("temp_x", 1.5)], false).unwrap();
    assert_eq!(store.cursor(), Some(2));

    store.push("draw", &[poly("x", 1.0)], false).unwrap();
    assert!(!store.is_registered("temp_x"));
    assert_eq!(ids(&store), vec![vec!["a"], vec!["x"]]);
    assert_eq!(store.cursor(), Some(1));

    assert_eq!(store.undo().unwrap()[0].id, "x");
    assert_eq!(store.undo().unwrap()[0].id, "a");
    assert!(!store.can_undo());
}

#[test]
fn draft_is_stripped_from_mixed_records() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("temp_x", 0.0), poly("a", 1.0)], false).unwrap();
    store.push("draw", &[poly("x", 0.0)], false).unwrap();
    assert_eq!(ids(&store), vec![vec!["a"], vec!["x"]]);
    assert_eq!(store.cursor(), Some(1));
}

#[test]
fn discard_draft_removes_its_records() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("draw point", &[poly("temp_x", 1.0)], false).unwrap();
    store.push("draw point", &[poly("temp_x", 1.5)], false).unwrap();

    assert!(store.discard_draft("temp_x"));
    assert_eq!(ids(&store), vec![vec!["a"]]);
    assert_eq!(store.cursor(), Some(0));
    assert!(!store.discard_draft("temp_x"));
}

#[test]
fn discard_draft_of_only_records_empties_cursor() {
    let mut store = HistoryStore::new();
    store.push("draw point", &[poly("temp_x", 1.0)], false).unwrap();
    assert!(store.discard_draft("temp_x"));
    assert_eq!(store.cursor(), None);
    assert!(!store.can_undo());
}

#[test]
fn discard_draft_clamps_redo_budget() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("draw point", &[poly("temp_x", 1.0)], false).unwrap();
    store.push("draw point", &[poly("temp_x", 1.5)], false).unwrap();
    store.undo().unwrap();
    assert_eq!(store.redo_budget(), 1);

    assert!(store.discard_draft("temp_x"));
    assert_eq!(store.cursor(), Some(0));
    assert_eq!(store.log().len(), 1);
    assert!(!store.can_redo());
}

#[test]
fn discard_drafts_clears_every_draft_after_restore() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("draw point", &[poly("temp_x", 1.0)], false).unwrap();
    store.push("draw point", &[poly("temp_y", 2.0)], false).unwrap();

    let sink = RecordingSink::default();
    let mut restored = HistoryStore::restore(store.snapshot()).unwrap().with_sink(Box::new(sink.clone()));
    assert_eq!(restored.discard_drafts(), 2);
    assert_eq!(ids(&restored), vec![vec!["a"]]);
    assert_eq!(restored.cursor(), Some(0));
    assert!(!restored.is_registered("temp_x"));
    assert!(!restored.is_registered("temp_y"));
    assert_eq!(sink.writes.lock().unwrap().len(), 1);

    assert_eq!(restored.discard_drafts(), 0);
    assert_eq!(sink.writes.lock().unwrap().len(), 1);
}

#[test]
fn discard_draft_ignores_finished_ids() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    assert!(!store.discard_draft("a"));
    assert!(store.is_registered("a"));
}

// =============================================================
// initial / clear
// =============================================================

#[test]
fn initial_with_clear_wipes_store() {
    let sink = RecordingSink::default();
    let mut store = HistoryStore::new().with_sink(Box::new(sink.clone()));
    store.push("draw", &[poly("a", 0.0)], false).unwrap();

    store.initial(&[poly("b", 0.0)], true).unwrap();
    assert!(!store.is_registered("a"));
    assert!(store.is_registered("b"));
    assert!(store.log().is_empty());
    assert_eq!(*sink.erases.lock().unwrap(), 1);
}

#[test]
fn initial_without_clear_keeps_history() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.initial(&[poly("b", 0.0)], false).unwrap();
    assert!(store.is_registered("a"));
    assert_eq!(store.cursor(), Some(0));
}

#[test]
fn clear_resets_everything() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("draw", &[poly("b", 0.0)], false).unwrap();
    store.undo().unwrap();

    store.clear();
    assert_eq!(store.cursor(), None);
    assert!(store.log().is_empty());
    assert_eq!(store.redo_budget(), 0);
    assert!(!store.is_registered("a"));
    assert!(!store.can_undo());
    assert!(!store.can_redo());
}

// =============================================================
// Persistence
// =============================================================

#[test]
fn every_mutation_writes_a_snapshot() {
    let sink = RecordingSink::default();
    let mut store = HistoryStore::new().with_sink(Box::new(sink.clone()));
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.undo().unwrap();
    store.redo().unwrap();

    let writes = sink.writes.lock().unwrap();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0].cursor_index, 0);
    assert_eq!(writes[1].cursor_index, -1);
    assert_eq!(writes[2].cursor_index, 0);
    assert_eq!(writes[2].action_log, vec!["a".to_owned()]);
}

#[test]
fn failing_sink_does_not_disturb_state() {
    let mut store = HistoryStore::new().with_sink(Box::new(FailingSink));
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    assert_eq!(store.cursor(), Some(0));
    assert_eq!(store.undo().unwrap().len(), 1);
    store.clear();
    assert!(store.log().is_empty());
}

#[test]
fn snapshot_restore_round_trip() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    store.push("split", &[poly("b", 1.0), poly("c", 2.0)], false).unwrap();
    store.undo().unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.action_log, vec!["a".to_owned(), "b#c".to_owned()]);

    let mut restored = HistoryStore::restore(snapshot.clone()).unwrap();
    assert_eq!(restored.snapshot(), snapshot);
    assert_eq!(restored.cursor(), Some(0));
    assert!(!restored.can_redo());
    assert_eq!(restored.undo().unwrap()[0].id, "a");
}

#[test]
fn restore_rejects_cursor_out_of_range() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    for cursor_index in [1, -2] {
        let snapshot = HistorySnapshot { cursor_index, ..store.snapshot() };
        assert!(matches!(HistoryStore::restore(snapshot), Err(HistoryError::CorruptSnapshot(_))));
    }
}

#[test]
fn restore_rejects_unregistered_log_entry() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    let mut snapshot = store.snapshot();
    snapshot.action_log.push("ghost".into());
    assert!(matches!(HistoryStore::restore(snapshot), Err(HistoryError::CorruptSnapshot(_))));
}

#[test]
fn restore_rejects_stack_cursor_out_of_range() {
    let snapshot: HistorySnapshot = serde_json::from_value(serde_json::json!({
        "cursorIndex": -1,
        "actionLog": [],
        "stacks": { "a": { "items": [], "index": 0 } }
    }))
    .unwrap();
    assert!(matches!(HistoryStore::restore(snapshot), Err(HistoryError::CorruptSnapshot(_))));
}

#[test]
fn restore_rejects_foreign_ids_in_stack() {
    let mut store = HistoryStore::new();
    store.push("draw", &[poly("a", 0.0)], false).unwrap();
    let mut snapshot = store.snapshot();
    let Some(stack) = snapshot.stacks.remove("a") else {
        panic!("stack missing");
    };
    snapshot.stacks.insert("b".into(), stack);
    snapshot.action_log = vec!["b".into()];
    assert!(matches!(HistoryStore::restore(snapshot), Err(HistoryError::CorruptSnapshot(_))));
}
