//! Geometry engine and snap resolver for the polygon editor.
//!
//! Everything in this crate is pure: functions take features and coordinates
//! by reference and return new values. The only non-determinism is the fresh
//! ids handed to features produced by split and merge. Coordinates are
//! `[longitude, latitude]` decimal degrees and every predicate is planar.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`feature`] | Feature, geometry, and coordinate nesting types |
//! | [`ops`] | Normalization, boundary clip, containment, point-in-boundary |
//! | [`split`] | Cutting a feature apart along a polyline |
//! | [`merge`] | Hole resolution and union of several features |
//! | [`viewport`] | Pixel points, the [`viewport::Projector`] seam, planar viewport |
//! | [`snap`] | Pixel-space vertex/edge snapping and snap-to-neighbours |
//! | [`consts`] | Shared numeric constants (thresholds, precision, epsilons) |

mod convert;

pub mod consts;
pub mod feature;
pub mod merge;
pub mod ops;
pub mod snap;
pub mod split;
pub mod viewport;

pub use feature::{Feature, FeatureId, Geometry, GeometryError, NestedCoords, Position};
pub use merge::{merge_with_hole_resolution, resolve_holes};
pub use ops::{boundary_clip, contains_geometry, normalize_to_multipolygon, point_in_boundary};
pub use snap::{SnapTarget, get_snap, shake_feature};
pub use split::split_by_line;
pub use viewport::{Pixel, Projector, Viewport};
