//! Shared numeric constants for the geometry crate.

// ── Snapping ────────────────────────────────────────────────────

/// Default pixel radius for snapping a pointer to existing vertices and edges.
pub const SNAP_THRESHOLD_PX: f64 = 10.0;

/// Default pixel radius used when snapping a whole feature to its neighbours.
pub const SHAKE_THRESHOLD_PX: f64 = 20.0;

/// Edge parameter `t` within this distance of 0 or 1 is treated as the endpoint.
pub const EDGE_T_EPSILON: f64 = 1e-9;

// ── Splitting ───────────────────────────────────────────────────

/// Default cut-line buffer width in kilometres.
pub const SPLIT_BUFFER_KM: f64 = 1e-10;

/// Kilometres per degree along a meridian, used to turn the buffer width into degrees.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Floor for the cut half-width in degrees. Anything thinner collapses on the
/// overlay grid and stops cutting; anything up to this size disappears when
/// outputs are rounded to [`SPLIT_DECIMALS`].
pub const MIN_CUT_HALF_WIDTH_DEG: f64 = 1e-7;

/// Output coordinates of a split are rounded to this many decimal digits.
pub const SPLIT_DECIMALS: i32 = 6;

// ── Cleaning ────────────────────────────────────────────────────

/// Cross products at or below this magnitude (degrees²) count as collinear.
pub const COLLINEAR_EPSILON: f64 = 1e-12;
