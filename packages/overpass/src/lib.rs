#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Overpass API client.
//!
//! The secondary geodata source: `OpenStreetMap` ways fetched by name
//! pattern and tag within a bounding box, with `out geom` so every way
//! carries its own coordinates. Public Overpass instances are shared and
//! rate-limited, so every request first acquires the client's
//! [`Throttle`], and equivalent endpoints are tried in order with a fixed
//! delay between attempts.

pub mod query;

use std::{sync::Arc, time::Duration};

use community_polygon_http::{
    HttpError,
    retry::{self, RetryPolicy},
    throttle::Throttle,
};
use geo::{Coord, LineString, Rect};
use thiserror::Error;

pub use query::WayKind;

/// Public Overpass endpoints, tried in order.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
];

/// Minimum interval between requests to the public instances.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(12);

/// Delay before trying the next endpoint after a failure.
pub const DEFAULT_ENDPOINT_DELAY: Duration = Duration::from_secs(2);

/// Per-request timeout.
pub const OVERPASS_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from the Overpass client.
#[derive(Debug, Error)]
pub enum OverpassError {
    /// HTTP request failed (the last endpoint's error when all failed).
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Building the HTTP client failed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The server reported a query runtime error.
    #[error("Overpass runtime error: {message}")]
    Runtime {
        /// The server's remark.
        message: String,
    },

    /// The response could not be decoded.
    #[error("Overpass decode error: {message}")]
    Decode {
        /// Description of the failure.
        message: String,
    },

    /// No endpoints are configured.
    #[error("No Overpass endpoints configured")]
    NoEndpoints,
}

/// One OSM way with its geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmWay {
    /// OSM way id.
    pub id: i64,
    /// `name` tag, if present.
    pub name: Option<String>,
    /// Geometry in WGS84 (x = longitude).
    pub line: LineString<f64>,
}

/// Client for a set of equivalent Overpass endpoints.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: reqwest::Client,
    endpoints: Vec<String>,
    throttle: Arc<Throttle>,
    endpoint_delay: Duration,
}

impl OverpassClient {
    /// Creates a client for the public endpoints with its own throttle.
    ///
    /// # Errors
    ///
    /// Returns [`OverpassError::Client`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str) -> Result<Self, OverpassError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(OVERPASS_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoints: DEFAULT_ENDPOINTS.iter().map(ToString::to_string).collect(),
            throttle: Arc::new(Throttle::new(DEFAULT_MIN_INTERVAL)),
            endpoint_delay: DEFAULT_ENDPOINT_DELAY,
        })
    }

    /// Replaces the endpoint list.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Shares `throttle` with other holders.
    #[must_use]
    pub fn with_throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets the delay between endpoint attempts.
    #[must_use]
    pub const fn with_endpoint_delay(mut self, delay: Duration) -> Self {
        self.endpoint_delay = delay;
        self
    }

    /// The throttle guarding this client's requests.
    #[must_use]
    pub fn throttle(&self) -> Arc<Throttle> {
        Arc::clone(&self.throttle)
    }

    /// Ways of `kind` whose name contains `name` (case-insensitive)
    /// inside `rect`.
    ///
    /// # Errors
    ///
    /// Returns the last endpoint's error if every endpoint fails.
    pub async fn ways_by_name(
        &self,
        name: &str,
        kind: WayKind,
        rect: &Rect<f64>,
    ) -> Result<Vec<OsmWay>, OverpassError> {
        self.execute(&query::ways_by_name(name, kind, rect)).await
    }

    /// Every named way of `kind` inside `rect`.
    ///
    /// # Errors
    ///
    /// Returns the last endpoint's error if every endpoint fails.
    pub async fn named_ways_in(
        &self,
        kind: WayKind,
        rect: &Rect<f64>,
    ) -> Result<Vec<OsmWay>, OverpassError> {
        self.execute(&query::named_ways_in(kind, rect)).await
    }

    /// Runs a QL query against each endpoint in turn until one succeeds.
    ///
    /// # Errors
    ///
    /// Returns the last endpoint's error if every endpoint fails.
    pub async fn execute(&self, ql: &str) -> Result<Vec<OsmWay>, OverpassError> {
        let mut last_error = OverpassError::NoEndpoints;

        for (idx, endpoint) in self.endpoints.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.endpoint_delay).await;
            }
            self.throttle.acquire().await;
            log::debug!("Overpass query on {endpoint}:\n{ql}");

            let result = retry::send_json(RetryPolicy::none(), || {
                self.client.get(endpoint).query(&[("data", ql)])
            })
            .await
            .map_err(OverpassError::from)
            .and_then(|json| parse_response(&json));

            match result {
                Ok(ways) => return Ok(ways),
                Err(e) => {
                    log::warn!("Overpass endpoint {endpoint} failed: {e}");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Extracts ways with geometry from an Overpass JSON response.
fn parse_response(json: &serde_json::Value) -> Result<Vec<OsmWay>, OverpassError> {
    if let Some(remark) = json["remark"].as_str()
        && remark.contains("runtime error")
    {
        return Err(OverpassError::Runtime {
            message: remark.to_string(),
        });
    }

    let elements = json["elements"]
        .as_array()
        .ok_or_else(|| OverpassError::Decode {
            message: "No elements array in Overpass response".to_string(),
        })?;

    let ways = elements
        .iter()
        .filter(|element| element["type"].as_str() == Some("way"))
        .filter_map(|element| {
            let coords: Vec<Coord<f64>> = element["geometry"]
                .as_array()?
                .iter()
                .filter_map(|pt| {
                    Some(Coord {
                        x: pt["lon"].as_f64()?,
                        y: pt["lat"].as_f64()?,
                    })
                })
                .collect();
            if coords.len() < 2 {
                return None;
            }
            Some(OsmWay {
                id: element["id"].as_i64().unwrap_or_default(),
                name: element["tags"]["name"].as_str().map(String::from),
                line: LineString::new(coords),
            })
        })
        .collect();

    Ok(ways)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ways_with_geometry() {
        let json = serde_json::json!({
            "version": 0.6,
            "elements": [
                {
                    "type": "way",
                    "id": 24_601,
                    "tags": {"name": "Mimico Creek", "waterway": "river"},
                    "geometry": [
                        {"lat": 43.655, "lon": -79.515},
                        {"lat": 43.640, "lon": -79.515}
                    ]
                },
                {
                    "type": "way",
                    "id": 2,
                    "tags": {"name": "Stub"},
                    "geometry": [{"lat": 43.0, "lon": -79.0}]
                },
                {"type": "node", "id": 3, "lat": 43.0, "lon": -79.0}
            ]
        });
        let ways = parse_response(&json).unwrap();
        assert_eq!(ways.len(), 1);
        assert_eq!(ways[0].id, 24_601);
        assert_eq!(ways[0].name.as_deref(), Some("Mimico Creek"));
        assert_eq!(ways[0].line.0[1], Coord { x: -79.515, y: 43.640 });
    }

    #[test]
    fn runtime_remark_is_an_error() {
        let json = serde_json::json!({
            "elements": [],
            "remark": "runtime error: Query timed out in \"query\" at line 3 after 61 seconds."
        });
        assert!(matches!(
            parse_response(&json),
            Err(OverpassError::Runtime { .. })
        ));
    }

    #[test]
    fn missing_elements_is_a_decode_error() {
        assert!(matches!(
            parse_response(&serde_json::json!({})),
            Err(OverpassError::Decode { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn no_endpoints_is_an_error() {
        let client = OverpassClient::new("test").unwrap().with_endpoints(vec![]);
        assert!(matches!(
            client.execute("[out:json];out;").await,
            Err(OverpassError::NoEndpoints)
        ));
    }
}
