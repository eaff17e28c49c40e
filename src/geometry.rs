//! Turns whatever a spreadsheet row points at into a list of GeoJSON features.
//!
//! Accepted shapes, checked in this order: a `FeatureCollection`, a single
//! `Feature`, a bare geometry object, or a bare coordinate array whose
//! geometry type is guessed from its nesting depth.

use crate::error::GeometryError;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde_json::{json, Value};

pub fn normalize(value: Value) -> Result<Vec<Feature>, GeometryError> {
    let tag = value
        .get("type")
        .map(|t| t.as_str().unwrap_or_default().to_string());

    match tag.as_deref() {
        Some("FeatureCollection") => Ok(FeatureCollection::try_from(value)?.features),
        Some("Feature") => Ok(vec![Feature::try_from(value)?]),
        Some(_) => Ok(vec![wrap(Geometry::try_from(value)?)]),
        None => {
            let kind = infer_type(&value)?;
            let geometry = Geometry::try_from(json!({ "type": kind, "coordinates": value }))?;
            Ok(vec![wrap(geometry)])
        }
    }
}

/// Guesses a geometry type from a bare coordinate array by probing the first
/// element at each depth. Mixed-depth arrays are not detected.
pub fn infer_type(coords: &Value) -> Result<&'static str, GeometryError> {
    let first = first_element(coords)?;
    if first.is_number() {
        return Ok("Point");
    }
    let second = first_element(first)?;
    if second.is_number() {
        return Ok("LineString");
    }
    if second.get(0).is_some_and(Value::is_number) {
        return Ok("Polygon");
    }
    Ok("MultiPolygon")
}

fn first_element(value: &Value) -> Result<&Value, GeometryError> {
    match value {
        Value::Array(items) => items.first().ok_or(GeometryError::EmptyCoordinates),
        other => Err(GeometryError::NotCoordinates(json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn wrap(geometry: Geometry) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(JsonObject::new()),
        foreign_members: None,
    }
}
