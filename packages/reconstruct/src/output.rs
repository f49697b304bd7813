//! The reconstruction record and its `GeoJSON` form.

use community_polygon_boundary_models::BoundaryEdge;
use community_polygon_geometry::{Coord, LineString, Point, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use serde_json::json;

use crate::{
    ReconstructError, compare::Comparison, corner::CornerMethod, fetch::GeometrySource,
    merge::MergeSelection, resolve::ResolutionTier, ring::SegmentKind,
};

/// The line-based community outline, in WGS84.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityPolygon {
    pub polygon: Polygon<f64>,
    pub area_m2: f64,
    pub contains_reference: bool,
    /// The ring self-intersected and was repaired.
    pub repaired: bool,
}

/// What happened to one boundary edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeReport {
    pub edge: BoundaryEdge,
    pub canonical_name: Option<String>,
    pub tier: ResolutionTier,
    pub source: Option<GeometrySource>,
    pub selection: Option<MergeSelection>,
    pub fragmented: bool,
    /// Merged line, in WGS84.
    pub merged_line: Option<LineString<f64>>,
    pub segment: Option<SegmentKind>,
    /// Ring segment, in WGS84.
    pub segment_line: Option<LineString<f64>>,
    /// Why the edge has no geometry, if it has none.
    pub error: Option<String>,
}

/// A corner between two adjacent edges.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerReport {
    pub first: String,
    pub second: String,
    /// Location in WGS84; `None` when no strategy found one.
    pub point: Option<Coord<f64>>,
    pub gap_m: Option<f64>,
    pub method: Option<CornerMethod>,
}

/// The zoning-parcel union, in WGS84.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoningReport {
    pub exception_number: u32,
    pub polygon: Polygon<f64>,
    pub area_m2: f64,
    pub parcel_count: usize,
    pub contains_reference: bool,
}

/// Everything a reconstruction produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub community_name: String,
    /// Reference point, in WGS84.
    pub reference: Coord<f64>,
    pub boundary: Option<CommunityPolygon>,
    pub edges: Vec<EdgeReport>,
    pub corners: Vec<CornerReport>,
    pub zoning: Option<ZoningReport>,
    pub comparison: Option<Comparison>,
}

fn properties(value: JsonValue) -> Option<JsonObject> {
    match value {
        JsonValue::Object(map) => Some(map),
        _ => None,
    }
}

fn feature(geometry: geojson::Value, props: JsonValue) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: properties(props),
        foreign_members: None,
    }
}

impl Reconstruction {
    /// Converts the record to a `FeatureCollection`: the community polygon,
    /// the zoning polygon, one line per edge, one point per corner and
    /// the reference point. The comparison goes in a foreign member.
    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let mut features = Vec::new();

        if let Some(boundary) = &self.boundary {
            features.push(feature(
                geojson::Value::from(&boundary.polygon),
                json!({
                    "layer": "community",
                    "name": self.community_name,
                    "source": "lines",
                    "area_m2": boundary.area_m2,
                    "contains_reference": boundary.contains_reference,
                    "repaired": boundary.repaired,
                }),
            ));
        }

        if let Some(zoning) = &self.zoning {
            features.push(feature(
                geojson::Value::from(&zoning.polygon),
                json!({
                    "layer": "zoning",
                    "name": self.community_name,
                    "source": "zoning",
                    "exception_number": zoning.exception_number,
                    "parcel_count": zoning.parcel_count,
                    "area_m2": zoning.area_m2,
                    "contains_reference": zoning.contains_reference,
                }),
            ));
        }

        for edge in &self.edges {
            let Some(line) = edge.segment_line.as_ref().or(edge.merged_line.as_ref()) else {
                continue;
            };
            features.push(feature(
                geojson::Value::from(line),
                json!({
                    "layer": "boundary_line",
                    "name": edge.edge.feature_name,
                    "feature_type": edge.edge.feature_type,
                    "compass_direction": edge.edge.compass_direction,
                    "canonical_name": edge.canonical_name,
                    "resolution": edge.tier.as_ref(),
                    "source": edge.source.map(|s| s.to_string()),
                    "selection": edge.selection.map(|s| s.to_string()),
                    "fragmented": edge.fragmented,
                    "segment": edge.segment.map(|s| s.to_string()),
                }),
            ));
        }

        for corner in &self.corners {
            let (Some(point), Some(method)) = (corner.point, corner.method) else {
                continue;
            };
            features.push(feature(
                geojson::Value::from(&Point::from(point)),
                json!({
                    "layer": "corner",
                    "first": corner.first,
                    "second": corner.second,
                    "method": method.as_ref(),
                    "gap_m": corner.gap_m,
                }),
            ));
        }

        features.push(feature(
            geojson::Value::from(&Point::from(self.reference)),
            json!({
                "layer": "reference",
                "name": self.community_name,
            }),
        ));

        let foreign = json!({
            "community_name": self.community_name,
            "comparison": self.comparison,
        });

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: properties(foreign),
        }
    }

    /// Pretty-printed `GeoJSON`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructError::Json`] if serialization fails.
    pub fn to_geojson_string(&self) -> Result<String, ReconstructError> {
        Ok(serde_json::to_string_pretty(&self.to_feature_collection())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use community_polygon_boundary_models::{CompassDirection, FeatureType};

    fn sample() -> Reconstruction {
        let square = Polygon::new(
            LineString::from(vec![
                (-79.51, 43.64),
                (-79.50, 43.64),
                (-79.50, 43.65),
                (-79.51, 43.65),
                (-79.51, 43.64),
            ]),
            vec![],
        );
        Reconstruction {
            community_name: "Thompson Orchard".to_string(),
            reference: Coord {
                x: -79.505,
                y: 43.645,
            },
            boundary: Some(CommunityPolygon {
                polygon: square,
                area_m2: 890_000.0,
                contains_reference: true,
                repaired: false,
            }),
            edges: vec![
                EdgeReport {
                    edge: BoundaryEdge::new(
                        FeatureType::Street,
                        "Bloor Street West",
                        Some(CompassDirection::North),
                    ),
                    canonical_name: Some("Bloor St W".to_string()),
                    tier: ResolutionTier::Exact,
                    source: Some(GeometrySource::Primary),
                    selection: Some(MergeSelection::Single),
                    fragmented: false,
                    merged_line: Some(LineString::from(vec![(-79.52, 43.65), (-79.49, 43.65)])),
                    segment: Some(SegmentKind::Clipped),
                    segment_line: Some(LineString::from(vec![(-79.50, 43.65), (-79.51, 43.65)])),
                    error: None,
                },
                EdgeReport {
                    edge: BoundaryEdge::new(FeatureType::Street, "Nowhere Lane", None),
                    canonical_name: None,
                    tier: ResolutionTier::Unresolved,
                    source: None,
                    selection: None,
                    fragmented: false,
                    merged_line: None,
                    segment: None,
                    segment_line: None,
                    error: Some("No geometry found".to_string()),
                },
            ],
            corners: vec![CornerReport {
                first: "Bloor Street West".to_string(),
                second: "Nowhere Lane".to_string(),
                point: None,
                gap_m: None,
                method: None,
            }],
            zoning: None,
            comparison: None,
        }
    }

    #[test]
    fn feature_collection_has_polygon_lines_and_reference() {
        let fc = sample().to_feature_collection();
        let layers: Vec<&str> = fc
            .features
            .iter()
            .filter_map(|f| f.property("layer").and_then(JsonValue::as_str))
            .collect();
        assert_eq!(layers, vec!["community", "boundary_line", "reference"]);

        let line = &fc.features[1];
        assert_eq!(
            line.property("canonical_name").and_then(JsonValue::as_str),
            Some("Bloor St W")
        );
        assert_eq!(
            line.property("compass_direction").and_then(JsonValue::as_str),
            Some("north")
        );
        assert_eq!(
            line.property("segment").and_then(JsonValue::as_str),
            Some("clipped")
        );
    }

    #[test]
    fn serializes_to_geojson() {
        let text = sample().to_geojson_string().unwrap();
        let value: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["community_name"], "Thompson Orchard");
        assert_eq!(value["features"][0]["geometry"]["type"], "Polygon");
    }
}
