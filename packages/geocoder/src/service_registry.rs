//! Geocoding services, declared in `services/*.toml` and embedded at
//! compile time.

use serde::Deserialize;

use crate::GeocodingProvider;

/// One configured geocoding service.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    pub id: String,
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Services are asked in ascending priority.
    pub priority: u32,
    pub provider: ProviderConfig,
}

/// Provider settings, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Nominatim {
        base_url: String,
        /// Minimum spacing between requests.
        rate_limit_ms: u64,
        #[serde(default = "nominatim_limit")]
        max_results: usize,
    },
    Google {
        base_url: String,
        /// Name of the environment variable carrying the API key.
        api_key_env: String,
    },
}

const fn enabled_by_default() -> bool {
    true
}

const fn nominatim_limit() -> usize {
    5
}

impl ProviderConfig {
    #[must_use]
    pub const fn provider(&self) -> GeocodingProvider {
        match self {
            Self::Nominatim { .. } => GeocodingProvider::Nominatim,
            Self::Google { .. } => GeocodingProvider::Google,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        match self {
            Self::Nominatim { base_url, .. } | Self::Google { base_url, .. } => base_url,
        }
    }
}

const SERVICE_FILES: [&str; 2] = [
    include_str!("../services/nominatim.toml"),
    include_str!("../services/google.toml"),
];

/// Every declared service, enabled or not, in declaration order.
///
/// # Panics
///
/// Panics if an embedded service file does not parse.
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_FILES
        .iter()
        .enumerate()
        .map(|(index, text)| {
            toml::from_str(text)
                .unwrap_or_else(|e| panic!("Invalid geocoding service file #{index}: {e}"))
        })
        .collect()
}

/// Enabled services in the order they should be asked, optionally
/// restricted to one provider.
#[must_use]
pub fn enabled_services(only: Option<GeocodingProvider>) -> Vec<GeocodingService> {
    let mut services: Vec<GeocodingService> = all_services()
        .into_iter()
        .filter(|s| s.enabled && only.is_none_or(|p| s.provider.provider() == p))
        .collect();
    services.sort_by_key(|s| s.priority);
    services
}

/// Looks up a service by id.
#[must_use]
pub fn service(id: &str) -> Option<GeocodingService> {
    all_services().into_iter().find(|s| s.id == id)
}
