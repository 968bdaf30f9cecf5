//! Core predicates and transforms: normalization, boundary clip, containment,
//! and point-in-boundary.
//!
//! All functions here are boundary-inclusive: a point on the boundary ring is
//! inside, and a feature whose edge runs along the boundary is contained.

#[cfg(test)]
#[path = "ops_test.rs"]
mod ops_test;

use geo::{BooleanOps, Intersects, Point, Relate};

use crate::convert::{from_geo, to_geo};
use crate::feature::{Feature, Geometry, GeometryError, MultiPolygonCoords, NestedCoords, PolygonCoords, Position, Ring};

/// Convert coordinates at any nesting depth into canonical MultiPolygon form.
///
/// Open rings are closed by repeating their first position. Empty input yields
/// an empty geometry.
///
/// # Errors
///
/// Returns [`GeometryError::ShortRing`] for a ring with fewer than four
/// positions after closing, and [`GeometryError::NonFinite`] for NaN or
/// infinite coordinates.
pub fn normalize_to_multipolygon(coords: &NestedCoords) -> Result<Geometry, GeometryError> {
    let multi: MultiPolygonCoords = match coords {
        NestedCoords::Ring(ring) if ring.is_empty() => Vec::new(),
        NestedCoords::Ring(ring) => vec![vec![ring.clone()]],
        NestedCoords::Polygon(rings) if rings.is_empty() => Vec::new(),
        NestedCoords::Polygon(rings) => vec![rings.clone()],
        NestedCoords::MultiPolygon(polygons) => polygons.clone(),
    };

    let closed = multi
        .into_iter()
        .map(|polygon| polygon.into_iter().map(close_ring).collect::<Result<PolygonCoords, _>>())
        .collect::<Result<MultiPolygonCoords, _>>()?;
    Ok(Geometry::new(closed))
}

fn close_ring(mut ring: Ring) -> Result<Ring, GeometryError> {
    if let Some(&[x, y]) = ring.iter().find(|[x, y]| !x.is_finite() || !y.is_finite()) {
        return Err(GeometryError::NonFinite(x, y));
    }
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    if ring.len() < 4 {
        return Err(GeometryError::ShortRing { len: ring.len() });
    }
    Ok(ring)
}

/// Clip a feature to an optional boundary.
///
/// Returns the feature unchanged when there is no boundary, when the feature
/// has no geometry, or when the boundary already contains it. Otherwise the
/// geometry is replaced by the intersection, which may be empty.
#[must_use]
pub fn boundary_clip(feature: &Feature, boundary: Option<&Geometry>) -> Feature {
    let Some(boundary) = boundary.filter(|b| !b.is_empty()) else {
        return feature.clone();
    };
    let Some(geometry) = feature.geometry.as_ref().filter(|g| !g.is_empty()) else {
        return feature.clone();
    };
    if contains_geometry(boundary, geometry) {
        return feature.clone();
    }

    let clipped = to_geo(&geometry.coordinates).intersection(&to_geo(&boundary.coordinates));
    feature.with_geometry(Geometry::new(from_geo(&clipped)))
}

/// Boundary-inclusive containment of `geometry` inside `boundary`.
///
/// An empty `geometry` is trivially contained; an empty `boundary` contains nothing else.
#[must_use]
pub fn contains_geometry(boundary: &Geometry, geometry: &Geometry) -> bool {
    if geometry.is_empty() {
        return true;
    }
    if boundary.is_empty() {
        return false;
    }
    to_geo(&boundary.coordinates)
        .relate(&to_geo(&geometry.coordinates))
        .is_contains()
}

/// Boundary-inclusive point-in-polygon test. Always `true` without a boundary.
#[must_use]
pub fn point_in_boundary(point: Position, boundary: Option<&Geometry>) -> bool {
    let Some(boundary) = boundary.filter(|b| !b.is_empty()) else {
        return true;
    };
    to_geo(&boundary.coordinates).intersects(&Point::new(point[0], point[1]))
}
