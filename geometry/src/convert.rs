//! Conversions between the wire coordinate types and `geo` types, plus the
//! coordinate clean-ups applied to overlay output.

#[cfg(test)]
#[path = "convert_test.rs"]
mod convert_test;

use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::consts::COLLINEAR_EPSILON;
use crate::feature::{MultiPolygonCoords, PolygonCoords, Position, Ring};

pub(crate) fn to_geo(coords: &MultiPolygonCoords) -> MultiPolygon<f64> {
    MultiPolygon::new(coords.iter().map(polygon_to_geo).collect())
}

pub(crate) fn polygon_to_geo(rings: &PolygonCoords) -> Polygon<f64> {
    let mut iter = rings.iter().map(|r| ring_to_geo(r));
    let exterior = iter.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, iter.collect())
}

pub(crate) fn ring_to_geo(ring: &[Position]) -> LineString<f64> {
    LineString::new(ring.iter().map(|&[x, y]| Coord { x, y }).collect())
}

pub(crate) fn from_geo(multi: &MultiPolygon<f64>) -> MultiPolygonCoords {
    multi.0.iter().map(polygon_from_geo).collect()
}

pub(crate) fn polygon_from_geo(polygon: &Polygon<f64>) -> PolygonCoords {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_from_geo)
        .collect()
}

fn ring_from_geo(ring: &LineString<f64>) -> Ring {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

/// Round every position to `decimals` digits.
pub(crate) fn round_coords(coords: &MultiPolygonCoords, decimals: i32) -> MultiPolygonCoords {
    let scale = 10f64.powi(decimals);
    coords
        .iter()
        .map(|polygon| {
            polygon
                .iter()
                .map(|ring| ring.iter().map(|&[x, y]| [(x * scale).round() / scale, (y * scale).round() / scale]).collect())
                .collect()
        })
        .collect()
}

/// Drop repeated and collinear vertices. Rings left with fewer than three
/// distinct vertices are removed; a polygon whose exterior collapses is removed.
pub(crate) fn clean_coords(coords: &MultiPolygonCoords) -> MultiPolygonCoords {
    coords
        .iter()
        .filter_map(|polygon| {
            let mut rings = polygon.iter();
            let exterior = clean_ring(rings.next()?)?;
            let mut cleaned = vec![exterior];
            cleaned.extend(rings.filter_map(|r| clean_ring(r)));
            Some(cleaned)
        })
        .collect()
}

fn clean_ring(ring: &[Position]) -> Option<Ring> {
    let mut open: Vec<Position> = Vec::with_capacity(ring.len());
    for &p in ring {
        if open.last() != Some(&p) {
            open.push(p);
        }
    }
    while open.len() > 1 && open.first() == open.last() {
        open.pop();
    }

    // Remove collinear middles until stable, wrapping around the ring.
    let mut changed = true;
    while changed && open.len() >= 3 {
        changed = false;
        let n = open.len();
        for i in 0..n {
            let prev = open[(i + n - 1) % n];
            let next = open[(i + 1) % n];
            if is_between_collinear(prev, open[i], next) {
                open.remove(i);
                changed = true;
                break;
            }
        }
    }

    if open.len() < 3 {
        return None;
    }
    let first = open[0];
    open.push(first);
    Some(open)
}

fn is_between_collinear(a: Position, b: Position, c: Position) -> bool {
    let (abx, aby) = (b[0] - a[0], b[1] - a[1]);
    let (bcx, bcy) = (c[0] - b[0], c[1] - b[1]);
    let cross = abx * bcy - aby * bcx;
    let dot = abx * bcx + aby * bcy;
    cross.abs() <= COLLINEAR_EPSILON && dot >= 0.0
}
