//! Decoding `f=geojson` features into `geo` geometries.

use std::collections::BTreeMap;

use geo::{Geometry, LineString, Polygon};
use geojson::{Feature, JsonObject};

use crate::{ArcGisError, registry::LookupLayer};

/// One path of a named line feature.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedLine {
    /// Value of the layer's name attribute, if present.
    pub name: Option<String>,
    /// The path, in WGS84 (x = longitude).
    pub line: LineString<f64>,
}

fn to_geometry(value: serde_json::Value) -> Result<Option<(Feature, Geometry<f64>)>, ArcGisError> {
    let feature = Feature::from_json_value(value).map_err(|e| ArcGisError::Decode {
        message: format!("Invalid GeoJSON feature: {e}"),
    })?;
    let Some(geometry) = feature.geometry.clone() else {
        return Ok(None);
    };
    let geometry = Geometry::<f64>::try_from(geometry).map_err(|e| ArcGisError::Decode {
        message: format!("Unsupported GeoJSON geometry: {e}"),
    })?;
    Ok(Some((feature, geometry)))
}

/// Splits line features into one [`NamedLine`] per path, reading the
/// name from `name_field`.
///
/// Features without geometry and paths with fewer than two points are
/// skipped.
///
/// # Errors
///
/// Returns [`ArcGisError::Decode`] if a feature is not valid `GeoJSON`.
pub fn named_lines(
    features: Vec<serde_json::Value>,
    name_field: &str,
) -> Result<Vec<NamedLine>, ArcGisError> {
    let mut lines = Vec::new();
    for value in features {
        let Some((feature, geometry)) = to_geometry(value)? else {
            continue;
        };
        let name = feature
            .property(name_field)
            .and_then(serde_json::Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let paths = match geometry {
            Geometry::LineString(line) => vec![line],
            Geometry::MultiLineString(multi) => multi.0,
            other => {
                log::debug!("Skipping non-line geometry {other:?}");
                continue;
            }
        };
        lines.extend(
            paths
                .into_iter()
                .filter(|line| line.0.len() >= 2)
                .map(|line| NamedLine {
                    name: name.clone(),
                    line,
                }),
        );
    }
    Ok(lines)
}

/// Extracts parcel polygons, flattening multi-part parcels.
///
/// # Errors
///
/// Returns [`ArcGisError::Decode`] if a feature is not valid `GeoJSON`.
pub fn polygons(features: Vec<serde_json::Value>) -> Result<Vec<Polygon<f64>>, ArcGisError> {
    let mut out = Vec::new();
    for value in features {
        let Some((_, geometry)) = to_geometry(value)? else {
            continue;
        };
        match geometry {
            Geometry::Polygon(p) => out.push(p),
            Geometry::MultiPolygon(mp) => out.extend(mp.0),
            other => log::debug!("Skipping non-polygon geometry {other:?}"),
        }
    }
    Ok(out)
}

/// One polygon of a lookup layer that contains the queried point.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerHit {
    /// Labelled values picked per the layer's `fields` table.
    pub fields: BTreeMap<String, String>,
    /// Every attribute the service returned.
    pub raw: JsonObject,
}

fn attribute_text(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Reads the attributes of point-lookup features and picks the labelled
/// fields of `layer`.
///
/// # Errors
///
/// Returns [`ArcGisError::Decode`] if a feature is not valid `GeoJSON`.
pub fn layer_hits(
    features: Vec<serde_json::Value>,
    layer: &LookupLayer,
) -> Result<Vec<LayerHit>, ArcGisError> {
    features
        .into_iter()
        .map(|value| {
            let feature = Feature::from_json_value(value).map_err(|e| ArcGisError::Decode {
                message: format!("Invalid GeoJSON feature from {}: {e}", layer.name),
            })?;
            let raw = feature.properties.unwrap_or_default();
            let fields = layer
                .fields
                .iter()
                .filter_map(|(label, candidates)| {
                    candidates
                        .iter()
                        .find_map(|attr| raw.get(attr).and_then(attribute_text))
                        .map(|text| (label.clone(), text))
                })
                .collect();
            Ok(LayerHit { fields, raw })
        })
        .collect()
}
