//! Multi-provider geocoder.
//!
//! Asks every provider in order and concatenates their results, dropping
//! any result closer than [`DEDUPE_DISTANCE_M`] to one already kept. A
//! failing provider is logged and skipped; the call only fails when every
//! provider failed.

use geo::{Distance, Haversine, Point};

use crate::{GeocodeError, GeocodedPlace, Geocoder};

/// Results closer than this to an earlier result are dropped.
pub const DEDUPE_DISTANCE_M: f64 = 50.0;

/// Geocoder combining several providers.
pub struct MultiGeocoder {
    providers: Vec<Box<dyn Geocoder>>,
    dedupe_distance_m: f64,
}

impl std::fmt::Debug for MultiGeocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiGeocoder")
            .field("providers", &self.providers.len())
            .field("dedupe_distance_m", &self.dedupe_distance_m)
            .finish()
    }
}

impl MultiGeocoder {
    /// Combines `providers`, asked in the given order.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn Geocoder>>) -> Self {
        Self {
            providers,
            dedupe_distance_m: DEDUPE_DISTANCE_M,
        }
    }

    /// Number of providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if there are no providers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn place_point(place: &GeocodedPlace) -> Point<f64> {
    Point::new(place.longitude, place.latitude)
}

/// Appends `candidates` to `kept`, skipping any within `threshold` meters
/// of an already kept result.
fn dedupe_into(kept: &mut Vec<GeocodedPlace>, candidates: Vec<GeocodedPlace>, threshold: f64) {
    for candidate in candidates {
        let at = place_point(&candidate);
        let duplicate = kept
            .iter()
            .any(|existing| Haversine.distance(at, place_point(existing)) < threshold);
        if duplicate {
            log::debug!(
                "Dropping duplicate {} result {:?}",
                candidate.provider,
                candidate.display_name
            );
        } else {
            kept.push(candidate);
        }
    }
}

#[async_trait::async_trait]
impl Geocoder for MultiGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodedPlace>, GeocodeError> {
        let mut kept = Vec::new();
        let mut last_error = None;
        let mut any_succeeded = false;

        for provider in &self.providers {
            match provider.geocode(query).await {
                Ok(results) => {
                    any_succeeded = true;
                    dedupe_into(&mut kept, results, self.dedupe_distance_m);
                }
                Err(e) => {
                    log::warn!("Geocoding '{query}' failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_succeeded => Err(e),
            _ => Ok(kept),
        }
    }
}
