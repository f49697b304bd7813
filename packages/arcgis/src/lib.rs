#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `ArcGIS` REST feature service client.
//!
//! The primary geodata source: a city's authoritative road centreline,
//! watercourse and zoning layers, queried by attribute and WGS84 envelope,
//! plus polygon layers queried by point. Requests use `f=geojson` with
//! `outSR=4326` and are paginated via
//! `resultOffset` while the server reports `exceededTransferLimit`.
//! Layer URLs and field names come from the [`registry`].

pub mod decode;
pub mod query;
pub mod registry;

use std::time::Duration;

use community_polygon_http::{
    HttpError,
    retry::{self, RetryPolicy},
};
use geo::{Coord, Polygon, Rect};
use thiserror::Error;

pub use decode::{LayerHit, NamedLine};
pub use query::NameFilter;
pub use registry::{LayerSet, LineLayer, LookupLayer};

/// Per-request timeout.
pub const ARCGIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on pages fetched for one query.
const MAX_PAGES: u32 = 50;

/// Errors from the `ArcGIS` client.
#[derive(Debug, Error)]
pub enum ArcGisError {
    /// HTTP request failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Building the HTTP client failed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The service returned an error object.
    #[error("ArcGIS error on {layer}: [{code}] {message}")]
    Api {
        /// Layer that was queried.
        layer: String,
        /// `ArcGIS` error code.
        code: i64,
        /// `ArcGIS` error message.
        message: String,
    },

    /// The response could not be decoded.
    #[error("ArcGIS decode error: {message}")]
    Decode {
        /// Description of the failure.
        message: String,
    },

    /// No layer set is registered under this id.
    #[error("Unknown ArcGIS layer set: {id}")]
    UnknownLayerSet {
        /// Requested id.
        id: String,
    },
}

/// Which line layer to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Road centrelines.
    Road,
    /// Watercourses.
    Waterline,
}

/// Client for one city's layer set.
#[derive(Debug, Clone)]
pub struct ArcGisClient {
    client: reqwest::Client,
    layers: LayerSet,
}

impl ArcGisClient {
    /// Creates a client for `layers` with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError::Client`] if the HTTP client cannot be built.
    pub fn new(layers: LayerSet, user_agent: &str) -> Result<Self, ArcGisError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(ARCGIS_TIMEOUT)
            .build()?;
        Ok(Self { client, layers })
    }

    /// Creates a client for a registered layer set.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError::UnknownLayerSet`] if `id` is not registered.
    pub fn for_layer_set(id: &str, user_agent: &str) -> Result<Self, ArcGisError> {
        let layers = registry::layer_set(id).ok_or_else(|| ArcGisError::UnknownLayerSet {
            id: id.to_string(),
        })?;
        Self::new(layers, user_agent)
    }

    /// The layer set this client queries.
    #[must_use]
    pub const fn layers(&self) -> &LayerSet {
        &self.layers
    }

    const fn line_layer(&self, kind: LineKind) -> &LineLayer {
        match kind {
            LineKind::Road => &self.layers.roads,
            LineKind::Waterline => &self.layers.waterlines,
        }
    }

    /// Fetches line paths from a line layer matching `filter`, optionally
    /// restricted to a WGS84 envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError`] if the request fails or the response cannot
    /// be decoded.
    pub async fn query_lines(
        &self,
        kind: LineKind,
        filter: &NameFilter,
        envelope: Option<&Rect<f64>>,
    ) -> Result<Vec<NamedLine>, ArcGisError> {
        let layer = self.line_layer(kind);
        let mut params = vec![
            ("where", filter.where_clause(&layer.name_field)),
            ("outFields", layer.name_field.clone()),
        ];
        if let Some(envelope) = envelope {
            params.extend(query::envelope_params(envelope));
        }
        log::debug!("ArcGIS {}: {}", layer.name, params[0].1);

        let url = self.layers.query_url(&layer.service);
        let features = self.fetch(&url, &layer.name, &params, true).await?;
        decode::named_lines(features, &layer.name_field)
    }

    /// Fetches zoning parcels carrying `exception_number`, optionally
    /// filtered by zone category and envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError`] if the request fails or the response cannot
    /// be decoded.
    pub async fn query_zoning(
        &self,
        exception_number: u32,
        zone_type: Option<&str>,
        envelope: Option<&Rect<f64>>,
    ) -> Result<Vec<Polygon<f64>>, ArcGisError> {
        let layer = &self.layers.zoning;
        let out_fields = if layer.out_fields.is_empty() {
            "*".to_string()
        } else {
            layer.out_fields.join(",")
        };
        let mut params = vec![
            (
                "where",
                query::zoning_where(
                    &layer.exception_field,
                    exception_number,
                    &layer.zone_field,
                    zone_type,
                ),
            ),
            ("outFields", out_fields),
        ];
        if let Some(envelope) = envelope {
            params.extend(query::envelope_params(envelope));
        }
        log::debug!("ArcGIS {}: {}", layer.name, params[0].1);

        let url = self.layers.query_url(&layer.service);
        let features = self.fetch(&url, &layer.name, &params, true).await?;
        decode::polygons(features)
    }

    /// Attributes of the `layer` polygons containing a WGS84 point.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError`] if the request fails or the response cannot
    /// be decoded.
    pub async fn query_point(
        &self,
        layer: &LookupLayer,
        point: Coord<f64>,
    ) -> Result<Vec<LayerHit>, ArcGisError> {
        let mut params = vec![
            ("where", "1=1".to_string()),
            ("outFields", "*".to_string()),
        ];
        params.extend(query::point_params(point));
        log::debug!("ArcGIS {} at ({}, {})", layer.name, point.y, point.x);

        let url = self.layers.query_url(&layer.service);
        let features = self.fetch(&url, &layer.name, &params, false).await?;
        decode::layer_hits(features, layer)
    }

    /// Fetches all feature objects for a query, following pagination.
    async fn fetch(
        &self,
        url: &str,
        layer_name: &str,
        params: &[(&str, String)],
        return_geometry: bool,
    ) -> Result<Vec<serde_json::Value>, ArcGisError> {
        let record_count = self.layers.max_record_count.to_string();
        let return_geometry = if return_geometry { "true" } else { "false" };
        let mut all_features = Vec::new();
        let mut offset = 0usize;

        for _ in 0..MAX_PAGES {
            let offset_param = offset.to_string();
            let json = retry::send_json(RetryPolicy::default(), || {
                self.client
                    .get(url)
                    .query(params)
                    .query(&[
                        ("f", "geojson"),
                        ("outSR", "4326"),
                        ("returnGeometry", return_geometry),
                        ("resultRecordCount", record_count.as_str()),
                        ("resultOffset", offset_param.as_str()),
                    ])
            })
            .await?;

            let page = parse_page(&json, layer_name)?;
            let count = page.features.len();
            all_features.extend(page.features);

            if count == 0 || !page.exceeded_transfer_limit {
                return Ok(all_features);
            }
            offset += count;
        }

        log::warn!("ArcGIS {layer_name}: stopped after {MAX_PAGES} pages");
        Ok(all_features)
    }
}

/// One page of a query response.
#[derive(Debug)]
struct Page {
    features: Vec<serde_json::Value>,
    exceeded_transfer_limit: bool,
}

/// Checks a response for an `ArcGIS` error object and extracts its
/// features and pagination flag.
///
/// `GeoJSON` output reports `exceededTransferLimit` either at the top
/// level or inside `properties`.
fn parse_page(json: &serde_json::Value, layer_name: &str) -> Result<Page, ArcGisError> {
    if let Some(error) = json.get("error") {
        return Err(ArcGisError::Api {
            layer: layer_name.to_string(),
            code: error["code"].as_i64().unwrap_or(0),
            message: error["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    let features = json["features"]
        .as_array()
        .ok_or_else(|| ArcGisError::Decode {
            message: format!("No features array in {layer_name} response"),
        })?
        .clone();

    let exceeded_transfer_limit = json["exceededTransferLimit"]
        .as_bool()
        .or_else(|| json["properties"]["exceededTransferLimit"].as_bool())
        .unwrap_or(false);

    Ok(Page {
        features,
        exceeded_transfer_limit,
    })
}
