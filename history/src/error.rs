use geometry::FeatureId;

/// Errors from [`crate::HistoryStore`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// An action record names an id that has no version stack. Nothing was applied.
    #[error("action record references unregistered entity {0:?}")]
    UnregisteredEntity(FeatureId),
    /// The id cannot be stored in an action record.
    #[error("invalid entity id {0:?}: ids must be non-empty and may not contain '#'")]
    InvalidId(FeatureId),
    /// A persisted snapshot breaks a store invariant.
    #[error("corrupt history snapshot: {0}")]
    CorruptSnapshot(String),
}
