//! Per-entity versioned history with atomic multi-entity undo/redo.
//!
//! Every feature the editor touches owns a [`VersionStack`]: its snapshots in
//! order, plus a cursor. A single user operation may touch several features at
//! once (a split deletes one and adds two), so the store also keeps an action
//! log whose records name the ids mutated together. Undo and redo walk that
//! log and step every named stack in lockstep.
//!
//! A snapshot whose geometry is `None` is a ghost: the feature did not exist at
//! that point. A created feature's stack starts with a ghost base; a deleted
//! feature's stack ends with one.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | [`HistoryStore`]: push, undo, redo, pending-change query |
//! | [`stack`] | [`VersionStack`] and its [`StackItem`] snapshots |
//! | [`draft`] | Draft id marking for features still being drawn |
//! | [`snapshot`] | Persisted layout, the [`SnapshotSink`] seam, file sink |
//! | [`error`] | [`HistoryError`] |

pub mod draft;
pub mod error;
pub mod snapshot;
pub mod stack;
pub mod store;

pub use draft::{DRAFT_PREFIX, draft_id, finished_id, is_draft};
pub use error::HistoryError;
pub use snapshot::{FileSnapshotSink, HistorySnapshot, PersistError, SnapshotSink};
pub use stack::{StackItem, VersionStack};
pub use store::{ActionRecord, ChangeOp, HistoryChange, HistoryStore, PendingChange};
