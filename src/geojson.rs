//! GeoJSON import and export.
//!
//! Import accepts a `FeatureCollection`, a single `Feature`, or a bare array
//! of features. Only `Polygon` and `MultiPolygon` geometries are kept; other
//! entries are skipped. Polygon geometry is wrapped into MultiPolygon form and
//! every ring is closed. A feature with malformed coordinates fails the whole
//! import.
//!
//! Ids are taken as given: strings verbatim, numbers in decimal, anything else
//! as the empty string. The editor renames empty and colliding ids on import.

#[cfg(test)]
#[path = "geojson_test.rs"]
mod geojson_test;

use geometry::{Feature, FeatureId, GeometryError, NestedCoords, normalize_to_multipolygon};
use serde_json::{Map, Value, json};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported GeoJSON document; expected a FeatureCollection, a Feature, or an array of features")]
    UnsupportedDocument,
    #[error("no polygon features found")]
    NoPolygons,
    #[error("feature {id:?} has malformed coordinates: {reason}")]
    Malformed { id: FeatureId, reason: String },
    #[error("feature {id:?}: {source}")]
    Geometry { id: FeatureId, source: GeometryError },
}

/// Parse GeoJSON text into polygon features.
///
/// # Errors
///
/// See [`features_from_value`]; also [`ImportError::Json`] for invalid JSON.
pub fn parse_features(text: &str) -> Result<Vec<Feature>, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    features_from_value(&value)
}

/// Extract polygon features from a parsed GeoJSON document.
///
/// # Errors
///
/// Returns [`ImportError::UnsupportedDocument`] for any other top-level
/// shape, [`ImportError::NoPolygons`] when nothing usable was found, and
/// [`ImportError::Malformed`] or [`ImportError::Geometry`] for a polygon
/// feature whose coordinates cannot be normalized.
pub fn features_from_value(value: &Value) -> Result<Vec<Feature>, ImportError> {
    let entries: &[Value] = match value {
        Value::Array(items) => items,
        Value::Object(object) => match object.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => match object.get("features") {
                Some(Value::Array(items)) => items,
                _ => return Err(ImportError::UnsupportedDocument),
            },
            Some("Feature") => std::slice::from_ref(value),
            _ => return Err(ImportError::UnsupportedDocument),
        },
        _ => return Err(ImportError::UnsupportedDocument),
    };

    let mut features = Vec::new();
    for entry in entries {
        if let Some(feature) = polygon_feature(entry)? {
            features.push(feature);
        }
    }
    debug!(entries = entries.len(), polygons = features.len(), "geojson parsed");

    if features.is_empty() {
        return Err(ImportError::NoPolygons);
    }
    Ok(features)
}

/// Serialize features as a GeoJSON `FeatureCollection`.
#[must_use]
pub fn to_feature_collection(features: &[Feature]) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

fn polygon_feature(entry: &Value) -> Result<Option<Feature>, ImportError> {
    let Some(object) = entry.as_object() else {
        return Ok(None);
    };
    if object.get("type").and_then(Value::as_str) != Some("Feature") {
        return Ok(None);
    }
    let Some(geometry) = object.get("geometry").and_then(Value::as_object) else {
        return Ok(None);
    };

    let id = feature_id(object.get("id"));
    let raw = geometry.get("coordinates").cloned().unwrap_or(Value::Null);
    let nested = match geometry.get("type").and_then(Value::as_str) {
        Some("Polygon") => serde_json::from_value(raw).map(NestedCoords::Polygon),
        Some("MultiPolygon") => serde_json::from_value(raw).map(NestedCoords::MultiPolygon),
        _ => return Ok(None),
    }
    .map_err(|err| ImportError::Malformed { id: id.clone(), reason: err.to_string() })?;

    let normalized =
        normalize_to_multipolygon(&nested).map_err(|source| ImportError::Geometry { id: id.clone(), source })?;
    let properties = match object.get("properties") {
        Some(Value::Object(properties)) => properties.clone(),
        _ => Map::new(),
    };
    Ok(Some(Feature::new(id, Some(normalized), properties)))
}

fn feature_id(raw: Option<&Value>) -> FeatureId {
    match raw {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => FeatureId::new(),
    }
}
