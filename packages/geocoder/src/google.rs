//! Google Maps Geocoding API client.
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use community_polygon_http::retry::{self, RetryPolicy};

use crate::{GeocodeError, GeocodedPlace, Geocoder, GeocodingProvider};

/// Client for the Google geocoding endpoint.
#[derive(Clone)]
pub struct GoogleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GoogleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GoogleClient {
    /// Creates a client using `api_key`.
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl Geocoder for GoogleClient {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodedPlace>, GeocodeError> {
        log::debug!("Google: {query}");
        let body = retry::send_json(RetryPolicy::default(), || {
            self.client
                .get(&self.base_url)
                .query(&[("address", query), ("key", self.api_key.as_str())])
        })
        .await?;
        parse_response(&body)
    }
}

/// Parses a Google geocoding response.
///
/// `ZERO_RESULTS` is an empty result set, any other non-`OK` status is a
/// provider error.
fn parse_response(body: &serde_json::Value) -> Result<Vec<GeocodedPlace>, GeocodeError> {
    let status = body["status"].as_str().unwrap_or("UNKNOWN");
    match status {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(vec![]),
        other => {
            let message = body["error_message"].as_str().unwrap_or("no results");
            return Err(GeocodeError::Provider {
                provider: GeocodingProvider::Google,
                message: format!("{other} - {message}"),
            });
        }
    }

    let results = body["results"].as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Google response has no results array".to_string(),
    })?;

    results
        .iter()
        .map(|result| {
            let location = &result["geometry"]["location"];
            let (Some(lat), Some(lng)) = (location["lat"].as_f64(), location["lng"].as_f64())
            else {
                return Err(GeocodeError::Parse {
                    message: "Missing geometry.location in Google response".to_string(),
                });
            };
            Ok(GeocodedPlace {
                latitude: lat,
                longitude: lng,
                display_name: result["formatted_address"].as_str().map(String::from),
                provider: GeocodingProvider::Google,
            })
        })
        .collect()
}
