//! Merging several features into one, turning nested pairs into holes.
//!
//! DESIGN
//! ======
//! Hole resolution runs to a fixed point: each pass looks for the first
//! ordered pair (A, B) of single-part features where A contains B, replaces
//! both with `A − B` under a fresh id, and starts over. Every pass removes at
//! least one feature, so the loop ends after at most `n` passes. The pairwise
//! scan is quadratic per pass, which is fine for the tens of features an edit
//! session selects.
//!
//! Multi-part features never take part in containment; they pass through and
//! are picked up by the final union.

#[cfg(test)]
#[path = "merge_test.rs"]
mod merge_test;

use geo::{BooleanOps, MultiPolygon, Relate};
use serde_json::Map;

use crate::convert::{clean_coords, from_geo, to_geo};
use crate::feature::{Feature, Geometry, new_feature_id};

/// Replace every containing pair with a single holed feature, repeatedly.
///
/// Features without geometry are passed through untouched.
#[must_use]
pub fn resolve_holes(features: &[Feature]) -> Vec<Feature> {
    let mut pool = features.to_vec();
    while let Some((outer, inner)) = find_containment(&pool) {
        let merged = punch_hole(&pool[outer], &pool[inner]);
        let (first, second) = if outer > inner { (outer, inner) } else { (inner, outer) };
        pool.remove(first);
        pool.remove(second);
        if let Some(merged) = merged {
            pool.push(merged);
        }
    }
    pool
}

/// Resolve holes, then union whatever remains into one feature.
///
/// Returns `None` when nothing with geometry is left, or the union is empty.
/// A single survivor is returned as-is; two or more are unioned, cleaned of
/// duplicate and collinear vertices, and given a fresh id.
#[must_use]
pub fn merge_with_hole_resolution(features: &[Feature]) -> Option<Feature> {
    let mut resolved: Vec<Feature> = resolve_holes(features)
        .into_iter()
        .filter(Feature::has_geometry)
        .collect();

    if resolved.len() < 2 {
        return resolved.pop();
    }

    let union = resolved
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .map(|g| to_geo(&g.coordinates))
        .reduce(|acc, next| acc.union(&next))?;

    let coordinates = clean_coords(&from_geo(&union));
    if coordinates.is_empty() {
        return None;
    }
    Some(Feature::new(new_feature_id(), Some(Geometry::new(coordinates)), Map::new()))
}

/// First `(outer, inner)` index pair where outer contains inner.
fn find_containment(pool: &[Feature]) -> Option<(usize, usize)> {
    let parts: Vec<Option<MultiPolygon<f64>>> = pool.iter().map(single_part).collect();
    for (i, outer) in parts.iter().enumerate() {
        let Some(outer) = outer else { continue };
        for (j, inner) in parts.iter().enumerate() {
            if i == j {
                continue;
            }
            let Some(inner) = inner else { continue };
            if outer.relate(inner).is_contains() {
                return Some((i, j));
            }
        }
    }
    None
}

/// The geometry of a feature that has exactly one polygon part.
fn single_part(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.as_ref()?;
    (geometry.part_count() == 1).then(|| to_geo(&geometry.coordinates))
}

fn punch_hole(outer: &Feature, inner: &Feature) -> Option<Feature> {
    let a = to_geo(&outer.geometry.as_ref()?.coordinates);
    let b = to_geo(&inner.geometry.as_ref()?.coordinates);
    let coordinates = from_geo(&a.difference(&b));
    if coordinates.is_empty() {
        return None;
    }
    Some(Feature::new(new_feature_id(), Some(Geometry::new(coordinates)), outer.properties.clone()))
}
