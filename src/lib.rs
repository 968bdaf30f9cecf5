//! Polygon map editor core.
//!
//! The [`editor::Editor`] coordinates a visible [`layer::FeatureLayer`], the
//! per-feature history in the `history` crate, and the geometry operations in
//! the `geometry` crate. Hosts drive it with pointer positions in lnglat and a
//! [`geometry::Projector`] for pixel-space snapping.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`editor`] | Tool modes, drawing, split/merge/delete/edit, undo/redo |
//! | [`layer`] | The features currently on the map |
//! | [`geojson`] | Import and export of GeoJSON documents |
//! | [`shake`] | Animated snap-to-neighbours |
//! | [`config`] | `POLYEDIT_*` environment configuration |

pub mod config;
pub mod editor;
pub mod geojson;
pub mod layer;
pub mod shake;

pub use config::{ConfigError, EditorConfig};
pub use editor::{Change, ChangeKind, Editor, EditorError, ToolAction, ToolMode};
pub use geojson::{ImportError, features_from_value, parse_features, to_feature_collection};
pub use layer::FeatureLayer;
pub use shake::ShakeAnimation;
