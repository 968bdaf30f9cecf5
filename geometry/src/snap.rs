//! Pixel-space snapping against the vertices and edges of existing features.
//!
//! Matching happens in container pixels so the snap radius feels the same at
//! every zoom level. Each call is a linear scan over candidate vertices and
//! edges with no caching; it is cheap enough for pointer-move frequency at the
//! low hundreds of vertices an editing session holds.

#[cfg(test)]
#[path = "snap_test.rs"]
mod snap_test;

use crate::consts::EDGE_T_EPSILON;
use crate::feature::{Feature, Geometry, Position};
use crate::viewport::{Pixel, Projector};

/// The best snap found for a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapTarget {
    /// Snapped position in lnglat.
    pub lnglat: Position,
    /// Pixel distance from the query point to the snapped position.
    pub distance_px: f64,
}

/// Find the nearest vertex or edge point within `threshold_px` of `point`.
///
/// Vertices are matched first. With `vertex_priority` set, a vertex match ends
/// the search; otherwise every edge is tested as well and the overall nearest
/// wins. Ties keep the earlier match, so a vertex beats an edge touching it at
/// the same distance. Returns `None` when nothing lies strictly within the
/// threshold.
#[must_use]
pub fn get_snap<P: Projector + ?Sized>(
    projector: &P,
    candidates: &[Feature],
    point: Position,
    threshold_px: f64,
    vertex_priority: bool,
) -> Option<SnapTarget> {
    let query = projector.to_pixel(point);
    let geometries: Vec<&Geometry> = candidates.iter().filter_map(|f| f.geometry.as_ref()).collect();
    let mut best: Option<SnapTarget> = None;

    for geometry in &geometries {
        for &vertex in geometry.positions() {
            let distance_px = query.distance(projector.to_pixel(vertex));
            consider(&mut best, SnapTarget { lnglat: vertex, distance_px }, threshold_px);
        }
    }

    if vertex_priority && best.is_some() {
        return best;
    }

    for geometry in &geometries {
        for ring in geometry.rings() {
            for pair in ring.windows(2) {
                if let Some(hit) = nearest_on_segment(projector, pair[0], pair[1], query) {
                    consider(&mut best, hit, threshold_px);
                }
            }
        }
    }
    best
}

fn consider(best: &mut Option<SnapTarget>, candidate: SnapTarget, threshold_px: f64) {
    if candidate.distance_px >= threshold_px {
        return;
    }
    if best.is_none_or(|b| candidate.distance_px < b.distance_px) {
        *best = Some(candidate);
    }
}

/// Nearest point to `query` on segment `a`–`b`, measured in pixels.
///
/// Zero-length segments yield `None`. When the projection lands on an
/// endpoint the endpoint's exact lnglat is returned instead of a round trip
/// through pixel space.
fn nearest_on_segment<P: Projector + ?Sized>(projector: &P, a: Position, b: Position, query: Pixel) -> Option<SnapTarget> {
    let ap = projector.to_pixel(a);
    let bp = projector.to_pixel(b);
    let (vx, vy) = (bp.x - ap.x, bp.y - ap.y);
    let len2 = vx * vx + vy * vy;
    if len2 == 0.0 {
        return None;
    }

    let t = (((query.x - ap.x) * vx + (query.y - ap.y) * vy) / len2).clamp(0.0, 1.0);
    if t <= EDGE_T_EPSILON {
        return Some(SnapTarget { lnglat: a, distance_px: query.distance(ap) });
    }
    if t >= 1.0 - EDGE_T_EPSILON {
        return Some(SnapTarget { lnglat: b, distance_px: query.distance(bp) });
    }

    let projected = Pixel::new(ap.x + t * vx, ap.y + t * vy);
    Some(SnapTarget {
        lnglat: projector.to_lnglat(projected),
        distance_px: query.distance(projected),
    })
}

/// Snap every vertex of `target` onto its nearest neighbour vertex or edge.
///
/// Returns the moved feature, or `None` when no vertex found anything within
/// `threshold_px` to move to.
#[must_use]
pub fn shake_feature<P: Projector + ?Sized>(
    projector: &P,
    target: &Feature,
    neighbours: &[Feature],
    threshold_px: f64,
) -> Option<Feature> {
    let geometry = target.geometry.as_ref()?;
    let mut moved = false;
    let coordinates = geometry
        .coordinates
        .iter()
        .map(|polygon| {
            polygon
                .iter()
                .map(|ring| {
                    ring.iter()
                        .map(|&vertex| match get_snap(projector, neighbours, vertex, threshold_px, false) {
                            Some(snap) if snap.lnglat != vertex => {
                                moved = true;
                                snap.lnglat
                            }
                            _ => vertex,
                        })
                        .collect()
                })
                .collect()
        })
        .collect();

    moved.then(|| target.with_geometry(Geometry::new(coordinates)))
}
