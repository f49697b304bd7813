//! In-memory sources and geocoder for pipeline tests.
//!
//! Fixtures are drawn in meters around [`ORIGIN`] and converted to WGS84,
//! so a reconstruction centred on [`ORIGIN`] sees them at their drawn
//! coordinates.

use std::collections::BTreeMap;

use community_polygon_arcgis::{LayerHit, LookupLayer, NameFilter};
use community_polygon_boundary_models::FeatureType;
use community_polygon_geocoder::{GeocodeError, GeocodedPlace, Geocoder, GeocodingProvider};
use community_polygon_geometry::{Coord, LineString, Polygon, Rect, frame::LocalFrame, line::LineExt};

use crate::{
    SourceError,
    sources::{PointLayers, PrimarySource, SecondarySource, SourceLine},
};

/// Reference point used by every fixture (x = longitude).
pub const ORIGIN: Coord<f64> = Coord {
    x: -79.5053,
    y: 43.6455,
};

pub fn frame() -> LocalFrame {
    LocalFrame::new(ORIGIN)
}

/// Local line from `(x, y)` meter pairs.
pub fn local_line(points: &[(f64, f64)]) -> LineString<f64> {
    LineString::from(points.to_vec())
}

/// Local polygon from `(x, y)` meter pairs.
pub fn local_polygon(points: &[(f64, f64)]) -> Polygon<f64> {
    Polygon::new(LineString::from(points.to_vec()), vec![])
}

/// Bounding-box overlap, as an envelope query would test it.
fn touches(line: &LineString<f64>, rect: &Rect<f64>) -> bool {
    line.bounds().is_some_and(|b| {
        b.min().x <= rect.max().x
            && b.max().x >= rect.min().x
            && b.min().y <= rect.max().y
            && b.max().y >= rect.min().y
    })
}

#[derive(Debug, Default)]
pub struct FakePrimary {
    lines: Vec<(FeatureType, String, LineString<f64>)>,
    parcels: Vec<(u32, Polygon<f64>)>,
}

impl FakePrimary {
    pub fn with_line(mut self, feature: FeatureType, name: &str, points: &[(f64, f64)]) -> Self {
        let line = frame().line_to_wgs84(&local_line(points));
        self.lines.push((feature, name.to_string(), line));
        self
    }

    pub fn with_parcel(mut self, exception_number: u32, points: &[(f64, f64)]) -> Self {
        let parcel = frame().polygon_to_wgs84(&local_polygon(points));
        self.parcels.push((exception_number, parcel));
        self
    }
}

#[async_trait::async_trait]
impl PrimarySource for FakePrimary {
    async fn lines(
        &self,
        feature: FeatureType,
        filter: &NameFilter,
        envelope: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError> {
        Ok(self
            .lines
            .iter()
            .filter(|(kind, _, _)| *kind == feature)
            .filter(|(_, name, _)| match filter {
                NameFilter::Exact(wanted) => name == wanted,
                NameFilter::Like(fragment) => {
                    name.to_uppercase().contains(&fragment.to_uppercase())
                }
                NameFilter::Any => true,
            })
            .filter(|(_, _, line)| touches(line, envelope))
            .map(|(_, name, line)| SourceLine {
                name: Some(name.clone()),
                line: line.clone(),
            })
            .collect())
    }

    async fn zoning_parcels(
        &self,
        exception_number: u32,
        _zone_type: Option<&str>,
        envelope: &Rect<f64>,
    ) -> Result<Vec<Polygon<f64>>, SourceError> {
        Ok(self
            .parcels
            .iter()
            .filter(|(number, parcel)| {
                *number == exception_number && touches(parcel.exterior(), envelope)
            })
            .map(|(_, parcel)| parcel.clone())
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct FakeSecondary {
    lines: Vec<(FeatureType, String, LineString<f64>)>,
}

impl FakeSecondary {
    pub fn with_line(mut self, feature: FeatureType, name: &str, points: &[(f64, f64)]) -> Self {
        let line = frame().line_to_wgs84(&local_line(points));
        self.lines.push((feature, name.to_string(), line));
        self
    }

    fn matching(
        &self,
        feature: FeatureType,
        bbox: &Rect<f64>,
        name_filter: impl Fn(&str) -> bool,
    ) -> Vec<SourceLine> {
        self.lines
            .iter()
            .filter(|(kind, name, line)| {
                *kind == feature && name_filter(name) && touches(line, bbox)
            })
            .map(|(_, name, line)| SourceLine {
                name: Some(name.clone()),
                line: line.clone(),
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SecondarySource for FakeSecondary {
    async fn lines_by_name(
        &self,
        name: &str,
        feature: FeatureType,
        bbox: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError> {
        let wanted = name.to_lowercase();
        Ok(self.matching(feature, bbox, |n| n.to_lowercase().contains(&wanted)))
    }

    async fn named_lines_in(
        &self,
        feature: FeatureType,
        bbox: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError> {
        Ok(self.matching(feature, bbox, |_| true))
    }
}

/// Geocoder answering fixed queries with local points.
#[derive(Debug, Default)]
pub struct FakeGeocoder {
    answers: BTreeMap<String, Vec<Coord<f64>>>,
}

impl FakeGeocoder {
    pub fn with_answer(mut self, query: &str, local: (f64, f64)) -> Self {
        let point = frame().to_wgs84(Coord {
            x: local.0,
            y: local.1,
        });
        self.answers.entry(query.to_string()).or_default().push(point);
        self
    }
}

#[async_trait::async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodedPlace>, GeocodeError> {
        Ok(self
            .answers
            .get(query)
            .map(|points| {
                points
                    .iter()
                    .map(|p| GeocodedPlace {
                        latitude: p.y,
                        longitude: p.x,
                        display_name: Some(query.to_string()),
                        provider: GeocodingProvider::Static,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

enum FakeAnswer {
    Hit(LayerHit),
    Nothing,
    Fails,
}

/// Lookup layers with one canned answer each, whatever the point.
#[derive(Default)]
pub struct FakeLayers {
    layers: Vec<(LookupLayer, FakeAnswer)>,
}

fn lookup_layer(id: &str, summary: Option<&str>, covers_city: bool) -> LookupLayer {
    LookupLayer {
        id: id.to_string(),
        name: format!("{id} layer"),
        service: format!("fake/{id}"),
        fields: BTreeMap::new(),
        summary: summary.map(ToString::to_string),
        covers_city,
    }
}

impl FakeLayers {
    /// A layer whose polygon contains every point; `values` are
    /// `(label, attribute, value)` triples.
    pub fn with_layer(
        mut self,
        id: &str,
        summary: &str,
        covers_city: bool,
        values: &[(&str, &str, &str)],
    ) -> Self {
        let hit = LayerHit {
            fields: values
                .iter()
                .map(|(label, _, value)| ((*label).to_string(), (*value).to_string()))
                .collect(),
            raw: values
                .iter()
                .map(|(_, attribute, value)| {
                    ((*attribute).to_string(), serde_json::Value::from(*value))
                })
                .collect(),
        };
        self.layers.push((
            lookup_layer(id, Some(summary), covers_city),
            FakeAnswer::Hit(hit),
        ));
        self
    }

    pub fn with_empty_layer(mut self, id: &str, covers_city: bool) -> Self {
        self.layers
            .push((lookup_layer(id, None, covers_city), FakeAnswer::Nothing));
        self
    }

    pub fn with_failing_layer(mut self, id: &str) -> Self {
        self.layers
            .push((lookup_layer(id, None, false), FakeAnswer::Fails));
        self
    }
}

#[async_trait::async_trait]
impl PointLayers for FakeLayers {
    fn lookup_layers(&self) -> Vec<LookupLayer> {
        self.layers.iter().map(|(layer, _)| layer.clone()).collect()
    }

    async fn hits_at(
        &self,
        layer: &LookupLayer,
        _point: Coord<f64>,
    ) -> Result<Vec<LayerHit>, SourceError> {
        match self.layers.iter().find(|(l, _)| l.id == layer.id) {
            Some((_, FakeAnswer::Hit(hit))) => Ok(vec![hit.clone()]),
            Some((_, FakeAnswer::Fails)) => Err(SourceError::Other {
                source_name: layer.name.clone(),
                message: "service unavailable".to_string(),
            }),
            Some((_, FakeAnswer::Nothing)) | None => Ok(vec![]),
        }
    }
}
