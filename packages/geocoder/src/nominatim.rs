//! Nominatim / OpenStreetMap geocoder client.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum on
//! the public instance, and requests must carry an identifying
//! `User-Agent`. The client owns a [`Throttle`] sized from the service
//! configuration.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::{sync::Arc, time::Duration};

use community_polygon_http::{
    retry::{self, RetryPolicy},
    throttle::Throttle,
};

use crate::{GeocodeError, GeocodedPlace, Geocoder, GeocodingProvider};

/// Client for a Nominatim search endpoint.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
    throttle: Arc<Throttle>,
}

impl NominatimClient {
    /// Creates a client allowing one request per `rate_limit`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        rate_limit: Duration,
        max_results: usize,
    ) -> Self {
        Self {
            client,
            base_url,
            max_results,
            throttle: Arc::new(Throttle::new(rate_limit)),
        }
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodedPlace>, GeocodeError> {
        let limit = self.max_results.to_string();
        self.throttle.acquire().await;
        log::debug!("Nominatim: {query}");
        let body = retry::send_json(RetryPolicy::default(), || {
            self.client.get(&self.base_url).query(&[
                ("q", query),
                ("format", "jsonv2"),
                ("limit", limit.as_str()),
            ])
        })
        .await?;
        parse_response(&body)
    }
}

/// Parses a Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Vec<GeocodedPlace>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    results
        .iter()
        .map(|hit| {
            let lat = hit["lat"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| GeocodeError::Parse {
                    message: "Missing lat in Nominatim response".to_string(),
                })?;

            let lon = hit["lon"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| GeocodeError::Parse {
                    message: "Missing lon in Nominatim response".to_string(),
                })?;

            Ok(GeocodedPlace {
                latitude: lat,
                longitude: lon,
                display_name: hit["display_name"].as_str().map(String::from),
                provider: GeocodingProvider::Nominatim,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_results() {
        let body = serde_json::json!([
            {
                "lat": "43.6497",
                "lon": "-79.5063",
                "display_name": "Royal York Road & Bloor Street West, Etobicoke, Toronto, Ontario"
            },
            {
                "lat": "43.6489",
                "lon": "-79.5071",
                "display_name": "Royal York, Bloor Street West, Toronto"
            }
        ]);
        let results = parse_response(&body).unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].latitude - 43.6497).abs() < 1e-6);
        assert!((results[0].longitude - -79.5063).abs() < 1e-6);
        assert_eq!(results[0].provider, GeocodingProvider::Nominatim);
        assert!(results[1].display_name.is_some());
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_array() {
        let body = serde_json::json!({"error": "Unable to geocode"});
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_missing_coordinates() {
        let body = serde_json::json!([{"display_name": "somewhere"}]);
        assert!(parse_response(&body).is_err());
    }
}
