//! Geodata source interfaces.
//!
//! The pipeline talks to its geodata sources through these traits so that
//! the concrete clients ([`ArcGisClient`], [`OverpassClient`]) can be
//! swapped for in-memory sources. All geometry crossing this boundary is
//! WGS84 (x = longitude).

use community_polygon_arcgis::{
    ArcGisClient, LayerHit, LineKind, LookupLayer, NameFilter, NamedLine,
};
use community_polygon_boundary_models::FeatureType;
use community_polygon_geometry::{Coord, LineString, Polygon, Rect};
use community_polygon_overpass::{OsmWay, OverpassClient, WayKind};

use crate::SourceError;

/// A named line from a geodata source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    /// The source's name for the feature, if any.
    pub name: Option<String>,
    /// Geometry in WGS84.
    pub line: LineString<f64>,
}

impl From<NamedLine> for SourceLine {
    fn from(value: NamedLine) -> Self {
        Self {
            name: value.name,
            line: value.line,
        }
    }
}

impl From<OsmWay> for SourceLine {
    fn from(value: OsmWay) -> Self {
        Self {
            name: value.name,
            line: value.line,
        }
    }
}

/// The authoritative source: attribute queries over named line layers and
/// a zoning parcel layer.
#[async_trait::async_trait]
pub trait PrimarySource: Send + Sync {
    /// Lines of `feature` matching `filter` that intersect `envelope`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the query fails.
    async fn lines(
        &self,
        feature: FeatureType,
        filter: &NameFilter,
        envelope: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError>;

    /// Zoning parcels carrying `exception_number` that intersect
    /// `envelope`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the query fails.
    async fn zoning_parcels(
        &self,
        exception_number: u32,
        zone_type: Option<&str>,
        envelope: &Rect<f64>,
    ) -> Result<Vec<Polygon<f64>>, SourceError>;
}

/// Polygon layers answering which area contains a point.
#[async_trait::async_trait]
pub trait PointLayers: Send + Sync {
    /// The layers to consult, in report order.
    fn lookup_layers(&self) -> Vec<LookupLayer>;

    /// Polygons of `layer` containing `point`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the query fails.
    async fn hits_at(
        &self,
        layer: &LookupLayer,
        point: Coord<f64>,
    ) -> Result<Vec<LayerHit>, SourceError>;
}

/// The fallback source: tag-based queries within a bounding box.
#[async_trait::async_trait]
pub trait SecondarySource: Send + Sync {
    /// Lines of `feature` whose name contains `name` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the query fails.
    async fn lines_by_name(
        &self,
        name: &str,
        feature: FeatureType,
        bbox: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError>;

    /// Every named line of `feature` in `bbox`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the query fails.
    async fn named_lines_in(
        &self,
        feature: FeatureType,
        bbox: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError>;
}

const fn line_kind(feature: FeatureType) -> LineKind {
    match feature {
        FeatureType::Street => LineKind::Road,
        FeatureType::Waterway => LineKind::Waterline,
    }
}

const fn way_kind(feature: FeatureType) -> WayKind {
    match feature {
        FeatureType::Street => WayKind::Highway,
        FeatureType::Waterway => WayKind::Waterway,
    }
}

#[async_trait::async_trait]
impl PrimarySource for ArcGisClient {
    async fn lines(
        &self,
        feature: FeatureType,
        filter: &NameFilter,
        envelope: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError> {
        let lines = self
            .query_lines(line_kind(feature), filter, Some(envelope))
            .await?;
        Ok(lines.into_iter().map(SourceLine::from).collect())
    }

    async fn zoning_parcels(
        &self,
        exception_number: u32,
        zone_type: Option<&str>,
        envelope: &Rect<f64>,
    ) -> Result<Vec<Polygon<f64>>, SourceError> {
        Ok(self
            .query_zoning(exception_number, zone_type, Some(envelope))
            .await?)
    }
}

#[async_trait::async_trait]
impl PointLayers for ArcGisClient {
    fn lookup_layers(&self) -> Vec<LookupLayer> {
        self.layers().lookups.clone()
    }

    async fn hits_at(
        &self,
        layer: &LookupLayer,
        point: Coord<f64>,
    ) -> Result<Vec<LayerHit>, SourceError> {
        Ok(self.query_point(layer, point).await?)
    }
}

#[async_trait::async_trait]
impl SecondarySource for OverpassClient {
    async fn lines_by_name(
        &self,
        name: &str,
        feature: FeatureType,
        bbox: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError> {
        let ways = self.ways_by_name(name, way_kind(feature), bbox).await?;
        Ok(ways.into_iter().map(SourceLine::from).collect())
    }

    async fn named_lines_in(
        &self,
        feature: FeatureType,
        bbox: &Rect<f64>,
    ) -> Result<Vec<SourceLine>, SourceError> {
        let ways = self.named_ways_in(way_kind(feature), bbox).await?;
        Ok(ways.into_iter().map(SourceLine::from).collect())
    }
}
