//! Draft ids for features that are still being drawn.
//!
//! While a polygon is drawn, each placed point is pushed under `temp_<id>` so
//! it can be undone point by point. Pushing the finished feature under `<id>`
//! folds the draft's records away.

use geometry::FeatureId;

/// Prefix marking a draft id.
pub const DRAFT_PREFIX: &str = "temp_";

/// The draft id for a feature id.
#[must_use]
pub fn draft_id(id: &str) -> FeatureId {
    format!("{DRAFT_PREFIX}{id}")
}

/// Returns `true` when `id` carries the draft prefix.
#[must_use]
pub fn is_draft(id: &str) -> bool {
    id.starts_with(DRAFT_PREFIX)
}

/// The finished id a draft id folds into, or `None` for a non-draft id.
#[must_use]
pub fn finished_id(id: &str) -> Option<&str> {
    id.strip_prefix(DRAFT_PREFIX)
}
