#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for boundary reconstruction.
//!
//! Reconstruction geocodes two kinds of queries: the community's reference
//! address, and street intersections ("Royal York Rd & Bloor St W,
//! Toronto, ON") used to locate corners. Providers are configured via TOML
//! files in `services/`:
//!
//! 1. **Nominatim / OpenStreetMap** (priority 1): free, 1 req/sec rate
//!    limit, enforced by a shared throttle.
//! 2. **Google Maps Geocoding API** (priority 2): requires the API key
//!    named in its service file (`GOOGLE_MAPS_API_KEY`); skipped when the
//!    key is not set.
//!
//! [`geocoder_for`] builds a [`multi::MultiGeocoder`] over the enabled
//! providers, in priority order.

pub mod google;
pub mod multi;
pub mod nominatim;
pub mod service_registry;

use std::time::Duration;

use community_polygon_http::HttpError;
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::service_registry::{GeocodingService, ProviderConfig, enabled_services};

/// Per-request timeout for geocoding providers.
pub const GEOCODER_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding the `User-Agent` sent to providers.
pub const USER_AGENT_ENV: &str = "COMMUNITY_POLYGON_USER_AGENT";

/// `User-Agent` used when [`USER_AGENT_ENV`] is not set. Nominatim's usage
/// policy requires an identifying agent.
pub const DEFAULT_USER_AGENT: &str =
    "community-polygon/0.1 (https://github.com/BSteffaniak/community-polygon)";

/// A geocoding result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// The matched place as described by the provider.
    pub display_name: Option<String>,
    /// Which provider produced this result.
    pub provider: GeocodingProvider,
}

/// Which geocoding provider produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GeocodingProvider {
    /// Nominatim / `OpenStreetMap`.
    Nominatim,
    /// Google Maps Geocoding API.
    Google,
    /// Results supplied by a caller (tests, fixed coordinates).
    #[strum(disabled)]
    Static,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Building the HTTP client failed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The provider answered with an error status.
    #[error("{provider} error: {message}")]
    Provider {
        /// Which provider failed.
        provider: GeocodingProvider,
        /// Provider status and message.
        message: String,
    },

    /// No provider is enabled and configured.
    #[error("No geocoding provider is configured")]
    NoProviders,
}

/// A geocoding provider.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocodes a free-form query. An empty vector means "no results".
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing fails.
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodedPlace>, GeocodeError>;
}

/// Creates the HTTP client shared by geocoding providers.
///
/// # Errors
///
/// Returns [`GeocodeError::Client`] if the TLS backend fails to initialize.
pub fn http_client() -> Result<reqwest::Client, GeocodeError> {
    let user_agent =
        std::env::var(USER_AGENT_ENV).unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(GEOCODER_TIMEOUT)
        .build()?)
}

/// Builds a provider from its service configuration.
///
/// Returns `Ok(None)` for providers that are not usable in this
/// environment (e.g. Google without an API key).
///
/// # Errors
///
/// Returns [`GeocodeError`] if the provider cannot be constructed.
pub fn build_geocoder(
    service: &GeocodingService,
    client: &reqwest::Client,
) -> Result<Option<Box<dyn Geocoder>>, GeocodeError> {
    match &service.provider {
        ProviderConfig::Nominatim {
            base_url,
            rate_limit_ms,
            max_results,
        } => Ok(Some(Box::new(nominatim::NominatimClient::new(
            client.clone(),
            base_url.clone(),
            Duration::from_millis(*rate_limit_ms),
            *max_results,
        )))),
        ProviderConfig::Google {
            base_url,
            api_key_env,
        } => {
            let Ok(api_key) = std::env::var(api_key_env) else {
                log::info!("{api_key_env} is not set, skipping {}", service.name);
                return Ok(None);
            };
            if api_key.trim().is_empty() {
                log::info!("{api_key_env} is empty, skipping {}", service.name);
                return Ok(None);
            }
            Ok(Some(Box::new(google::GoogleClient::new(
                client.clone(),
                base_url.clone(),
                api_key,
            ))))
        }
    }
}

/// Builds a multi-provider geocoder over every enabled, usable provider,
/// or only the services of `only` when given.
///
/// # Errors
///
/// Returns [`GeocodeError::NoProviders`] if no provider could be built.
pub fn geocoder_for(
    only: Option<GeocodingProvider>,
) -> Result<multi::MultiGeocoder, GeocodeError> {
    let client = http_client()?;
    let mut providers = Vec::new();
    for service in enabled_services(only) {
        if let Some(provider) = build_geocoder(&service, &client)? {
            log::info!("Geocoding with {}", service.name);
            providers.push(provider);
        }
    }
    if providers.is_empty() {
        return Err(GeocodeError::NoProviders);
    }
    Ok(multi::MultiGeocoder::new(providers))
}

/// Geocodes `query` and returns the first result, if any.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the geocoder fails.
pub async fn geocode_first(
    geocoder: &dyn Geocoder,
    query: &str,
) -> Result<Option<GeocodedPlace>, GeocodeError> {
    Ok(geocoder.geocode(query).await?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_are_snake_case() {
        assert_eq!(GeocodingProvider::Nominatim.to_string(), "nominatim");
        assert_eq!(GeocodingProvider::Google.as_ref(), "google");
        assert_eq!(
            "Nominatim".parse::<GeocodingProvider>().unwrap(),
            GeocodingProvider::Nominatim
        );
        assert!("static".parse::<GeocodingProvider>().is_err());
    }

    #[test]
    fn builds_nominatim_from_registry() {
        let client = reqwest::Client::new();
        let nominatim = service_registry::service("nominatim").unwrap();
        assert!(build_geocoder(&nominatim, &client).unwrap().is_some());
    }

    #[test]
    fn google_without_key_is_skipped() {
        let client = reqwest::Client::new();
        let service = GeocodingService {
            id: "google".to_string(),
            name: "Google".to_string(),
            enabled: true,
            priority: 2,
            provider: ProviderConfig::Google {
                base_url: "https://maps.example.com".to_string(),
                api_key_env: "COMMUNITY_POLYGON_TEST_UNSET_KEY".to_string(),
            },
        };
        assert!(build_geocoder(&service, &client).unwrap().is_none());
    }
}
