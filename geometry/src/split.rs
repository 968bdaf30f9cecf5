//! Cutting a feature apart along a polyline.
//!
//! DESIGN
//! ======
//! The cut line is widened into a sliver polygon (one rectangle per segment,
//! extended past each end by the half-width and unioned together) and
//! subtracted from the feature. Every polygon of the difference becomes its
//! own feature. The sliver leaves sub-micro-degree seams on both sides of the
//! cut; rounding outputs to six decimals closes them again.

#[cfg(test)]
#[path = "split_test.rs"]
mod split_test;

use geo::{BooleanOps, Intersects, MultiPolygon, Polygon};

use crate::consts::{KM_PER_DEGREE, MIN_CUT_HALF_WIDTH_DEG, SPLIT_DECIMALS};
use crate::convert::{polygon_from_geo, ring_to_geo, round_coords, to_geo};
use crate::feature::{Feature, Position, new_feature_id};

/// Split `feature` along `line`, buffering the line by `buffer_km`.
///
/// Returns one feature per resulting polygon, each with a fresh id and empty
/// properties. A line that misses the feature, a line with fewer than two
/// distinct points, or a feature without geometry yields no features.
#[must_use]
pub fn split_by_line(feature: &Feature, line: &[Position], buffer_km: f64) -> Vec<Feature> {
    let Some(geometry) = feature.geometry.as_ref().filter(|g| !g.is_empty()) else {
        return Vec::new();
    };
    let subject = to_geo(&geometry.coordinates);
    if !subject.intersects(&ring_to_geo(line)) {
        return Vec::new();
    }

    let half_width = (buffer_km / KM_PER_DEGREE).max(MIN_CUT_HALF_WIDTH_DEG);
    let Some(cutter) = cut_sliver(line, half_width) else {
        return Vec::new();
    };

    subject
        .difference(&cutter)
        .0
        .iter()
        .map(|polygon| {
            let coords = round_coords(&vec![polygon_from_geo(polygon)], SPLIT_DECIMALS);
            Feature::from_coords(new_feature_id(), coords)
        })
        .filter(Feature::has_geometry)
        .collect()
}

/// Union of one thin rectangle per non-degenerate segment of `line`.
fn cut_sliver(line: &[Position], half_width: f64) -> Option<MultiPolygon<f64>> {
    let mut sliver: Option<MultiPolygon<f64>> = None;
    for pair in line.windows(2) {
        let Some(rect) = segment_rect(pair[0], pair[1], half_width) else {
            continue;
        };
        let rect = MultiPolygon::new(vec![rect]);
        sliver = Some(match sliver {
            Some(acc) => acc.union(&rect),
            None => rect,
        });
    }
    sliver
}

fn segment_rect(a: Position, b: Position, half_width: f64) -> Option<Polygon<f64>> {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return None;
    }
    // Unit direction scaled to the half-width, and its left normal.
    let (ux, uy) = (dx / len * half_width, dy / len * half_width);
    let (nx, ny) = (-uy, ux);
    let start = [a[0] - ux, a[1] - uy];
    let end = [b[0] + ux, b[1] + uy];
    let ring = [
        [start[0] + nx, start[1] + ny],
        [end[0] + nx, end[1] + ny],
        [end[0] - nx, end[1] - ny],
        [start[0] - nx, start[1] - ny],
        [start[0] + nx, start[1] + ny],
    ];
    Some(Polygon::new(ring_to_geo(&ring), Vec::new()))
}
