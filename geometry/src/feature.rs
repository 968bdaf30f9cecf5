//! Feature model: polygon features, their geometry, and coordinate nesting.
//!
//! This module defines the value types every other part of the editor passes
//! around: `Feature` (one editable polygon with a stable id), `Geometry` (its
//! canonical MultiPolygon coordinates), `NestedCoords` (coordinates as the host
//! hands them over, at any nesting depth), and a typed accessor for the
//! open-ended `properties` bag (`FeatureProps`).
//!
//! A feature whose geometry is `None` is a ghost: the entity exists in history
//! but not on the map at that point in time. An empty coordinate list is
//! treated the same way when deciding presence.

#[cfg(test)]
#[path = "feature_test.rs"]
mod feature_test;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Stable identifier for a feature across its whole lifetime.
pub type FeatureId = String;

/// A `[longitude, latitude]` pair in decimal degrees.
pub type Position = [f64; 2];

/// A closed ring of positions (first == last).
pub type Ring = Vec<Position>;

/// One polygon: exterior ring followed by interior rings (holes).
pub type PolygonCoords = Vec<Ring>;

/// A set of polygons.
pub type MultiPolygonCoords = Vec<PolygonCoords>;

/// Error raised for structurally malformed coordinate input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A ring has too few positions to enclose an area once closed.
    #[error("ring has {len} positions; a closed ring needs at least 4")]
    ShortRing { len: usize },
    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate [{0}, {1}]")]
    NonFinite(f64, f64),
}

/// GeoJSON `type` tag for features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureType {
    #[default]
    Feature,
}

/// GeoJSON `type` tag for geometry. Only MultiPolygon is ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometryType {
    #[default]
    MultiPolygon,
}

/// Canonical MultiPolygon geometry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default)]
    pub kind: GeometryType,
    pub coordinates: MultiPolygonCoords,
}

impl Geometry {
    #[must_use]
    pub fn new(coordinates: MultiPolygonCoords) -> Self {
        Self { kind: GeometryType::MultiPolygon, coordinates }
    }

    /// Returns `true` when there are no polygons at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Number of polygons (parts) in this geometry.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.coordinates.len()
    }

    /// Iterate every position of every ring, closing positions included.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.coordinates.iter().flatten().flatten()
    }

    /// Iterate every ring of every polygon.
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.coordinates.iter().flatten()
    }
}

/// Coordinates at any of the three nesting depths a host may supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedCoords {
    /// A single ring: `[[lng, lat], ...]`.
    Ring(Ring),
    /// One polygon: `[[[lng, lat], ...], ...]`.
    Polygon(PolygonCoords),
    /// Many polygons: `[[[[lng, lat], ...], ...], ...]`.
    MultiPolygon(MultiPolygonCoords),
}

/// One editable polygon feature, serialized as a GeoJSON `Feature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    pub kind: FeatureType,
    /// Stable identity for the feature's lifetime.
    pub id: FeatureId,
    /// Geometry, or `None` when the feature does not exist at this point in history.
    pub geometry: Option<Geometry>,
    /// Host-defined key/value properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    #[must_use]
    pub fn new(id: impl Into<FeatureId>, geometry: Option<Geometry>, properties: Map<String, Value>) -> Self {
        Self { kind: FeatureType::Feature, id: id.into(), geometry, properties }
    }

    /// Build a feature with empty properties from raw MultiPolygon coordinates.
    #[must_use]
    pub fn from_coords(id: impl Into<FeatureId>, coordinates: MultiPolygonCoords) -> Self {
        Self::new(id, Some(Geometry::new(coordinates)), Map::new())
    }

    /// Returns `true` when the feature has at least one polygon.
    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.geometry.as_ref().is_some_and(|g| !g.is_empty())
    }

    /// A copy of this feature with its geometry removed (the "deleted" state).
    #[must_use]
    pub fn ghost(&self) -> Self {
        Self { geometry: None, ..self.clone() }
    }

    /// A copy of this feature carrying a new geometry.
    #[must_use]
    pub fn with_geometry(&self, geometry: Geometry) -> Self {
        Self { geometry: Some(geometry), ..self.clone() }
    }

    /// Typed view over the properties bag.
    #[must_use]
    pub fn props(&self) -> FeatureProps<'_> {
        FeatureProps::new(&self.properties)
    }
}

/// Generate a fresh feature id.
#[must_use]
pub fn new_feature_id() -> FeatureId {
    Uuid::new_v4().to_string()
}

/// Typed access to common fields of a feature's `properties` map.
pub struct FeatureProps<'a> {
    value: &'a Map<String, Value>,
}

impl<'a> FeatureProps<'a> {
    #[must_use]
    pub fn new(value: &'a Map<String, Value>) -> Self {
        Self { value }
    }

    /// Display name. Empty string when absent.
    #[must_use]
    pub fn name(&self) -> &str {
        self.value.get("name").and_then(Value::as_str).unwrap_or("")
    }

    /// Host-assigned code, e.g. an administrative district code. Empty string when absent.
    #[must_use]
    pub fn code(&self) -> &str {
        self.value.get("code").and_then(Value::as_str).unwrap_or("")
    }
}
