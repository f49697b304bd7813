//! Point-in-layer lookups.
//!
//! Which zoning area, transit station area, neighbourhood, ward and
//! planning district a point falls in. Every layer is asked in turn; a
//! failing layer is recorded and the rest still run.

use std::collections::BTreeMap;

use community_polygon_arcgis::LookupLayer;
use community_polygon_geometry::Coord;
use serde::Serialize;

use crate::sources::PointLayers;

/// Lookup layer holding the zoning designation.
pub const ZONING_LAYER: &str = "zoning";

/// What one layer said about the point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayerOutcome {
    /// A polygon contains the point.
    Found {
        fields: BTreeMap<String, String>,
        raw: serde_json::Map<String, serde_json::Value>,
    },
    /// No polygon contains the point.
    Outside,
    /// The layer covers the whole city yet had nothing here.
    Missing,
    /// The query failed.
    Failed { error: String },
}

/// One layer's answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerLookup {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    summary_field: Option<String>,
    #[serde(flatten)]
    pub outcome: LayerOutcome,
}

impl LayerLookup {
    /// A labelled value from the hit.
    #[must_use]
    pub fn field(&self, label: &str) -> Option<&str> {
        match &self.outcome {
            LayerOutcome::Found { fields, .. } => fields.get(label).map(String::as_str),
            _ => None,
        }
    }

    /// One-line description of the outcome.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.outcome {
            LayerOutcome::Found { .. } => self
                .summary_field
                .as_deref()
                .and_then(|label| self.field(label))
                .unwrap_or("found")
                .to_string(),
            LayerOutcome::Outside => "not in this area".to_string(),
            LayerOutcome::Missing => "no data".to_string(),
            LayerOutcome::Failed { error } => format!("error: {error}"),
        }
    }
}

/// The zoning designation at a point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoningDesignation {
    pub zone: Option<String>,
    pub zoning_string: Option<String>,
    /// Site-specific exception, when the parcel carries one.
    pub exception_number: Option<u32>,
}

/// Every layer's answer for one point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationProfile {
    pub latitude: f64,
    pub longitude: f64,
    pub layers: Vec<LayerLookup>,
}

impl LocationProfile {
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&LayerLookup> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// The zoning designation, if the zoning layer found one.
    ///
    /// The exception number only counts when the exception flag is set;
    /// layers without a flag attribute rely on the number alone.
    #[must_use]
    pub fn zoning(&self) -> Option<ZoningDesignation> {
        let layer = self.layer(ZONING_LAYER)?;
        if !matches!(layer.outcome, LayerOutcome::Found { .. }) {
            return None;
        }
        let flagged = layer
            .field("exception_flag")
            .is_none_or(|flag| flag.eq_ignore_ascii_case("y"));
        let exception_number = layer
            .field("exception_number")
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| flagged && *n > 0);
        Some(ZoningDesignation {
            zone: layer.field("zone").map(ToString::to_string),
            zoning_string: layer.field("zoning_string").map(ToString::to_string),
            exception_number,
        })
    }

    /// Serializes the profile as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

async fn lookup_layer(
    source: &dyn PointLayers,
    layer: LookupLayer,
    point: Coord<f64>,
) -> LayerLookup {
    let outcome = match source.hits_at(&layer, point).await {
        Ok(hits) => {
            if hits.len() > 1 {
                log::debug!(
                    "{}: {} polygons contain the point, using the first",
                    layer.name,
                    hits.len()
                );
            }
            match hits.into_iter().next() {
                Some(hit) => LayerOutcome::Found {
                    fields: hit.fields,
                    raw: hit.raw,
                },
                None if layer.covers_city => LayerOutcome::Missing,
                None => LayerOutcome::Outside,
            }
        }
        Err(e) => {
            log::warn!("{} lookup failed: {e}", layer.name);
            LayerOutcome::Failed {
                error: e.to_string(),
            }
        }
    };
    LayerLookup {
        id: layer.id,
        name: layer.name,
        summary_field: layer.summary,
        outcome,
    }
}

/// Looks a WGS84 point up in every layer of `source`.
pub async fn profile(source: &dyn PointLayers, point: Coord<f64>) -> LocationProfile {
    let mut layers = Vec::new();
    for layer in source.lookup_layers() {
        let lookup = lookup_layer(source, layer, point).await;
        log::info!("  {:<20} {}", lookup.id, lookup.summary());
        layers.push(lookup);
    }
    LocationProfile {
        latitude: point.y,
        longitude: point.x,
        layers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLayers, ORIGIN};

    fn layers() -> FakeLayers {
        FakeLayers::default()
            .with_layer(
                "zoning",
                "zoning_string",
                true,
                &[
                    ("zone", "ZN_ZONE", "RD"),
                    ("zoning_string", "ZN_STRING", "RD (f15.0; a550) (x42)"),
                    ("exception_flag", "ZN_EXCPTN", "Y"),
                    ("exception_number", "ZN_EXCPTN_NO", "42"),
                ],
            )
            .with_empty_layer("mtsa", false)
            .with_empty_layer("ward", true)
            .with_failing_layer("neighbourhood")
    }

    #[tokio::test]
    async fn every_layer_is_reported_in_order() {
        let profile = profile(&layers(), ORIGIN).await;
        let ids: Vec<&str> = profile.layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["zoning", "mtsa", "ward", "neighbourhood"]);

        assert_eq!(profile.layers[0].summary(), "RD (f15.0; a550) (x42)");
        assert_eq!(profile.layers[1].outcome, LayerOutcome::Outside);
        assert_eq!(profile.layers[2].outcome, LayerOutcome::Missing);
        assert!(matches!(profile.layers[3].outcome, LayerOutcome::Failed { .. }));
        assert!(profile.layers[3].summary().starts_with("error:"));
    }

    #[tokio::test]
    async fn zoning_exception_needs_the_flag() {
        let profile = profile(&layers(), ORIGIN).await;
        let zoning = profile.zoning().unwrap();
        assert_eq!(zoning.zone.as_deref(), Some("RD"));
        assert_eq!(zoning.exception_number, Some(42));

        let unflagged = FakeLayers::default().with_layer(
            "zoning",
            "zone",
            true,
            &[
                ("zone", "ZN_ZONE", "RD"),
                ("exception_flag", "ZN_EXCPTN", "N"),
                ("exception_number", "ZN_EXCPTN_NO", "42"),
            ],
        );
        let profile = super::profile(&unflagged, ORIGIN).await;
        assert_eq!(profile.zoning().unwrap().exception_number, None);
    }

    #[tokio::test]
    async fn profile_serializes_with_status_tags() {
        let profile = profile(&layers(), ORIGIN).await;
        let json: serde_json::Value =
            serde_json::from_str(&profile.to_json_string().unwrap()).unwrap();
        assert_eq!(json["layers"][0]["status"], "found");
        assert_eq!(json["layers"][0]["fields"]["zone"], "RD");
        assert_eq!(json["layers"][0]["raw"]["ZN_EXCPTN_NO"], "42");
        assert_eq!(json["layers"][1]["status"], "outside");
        assert_eq!(json["layers"][3]["status"], "failed");
        assert!((json["latitude"].as_f64().unwrap() - ORIGIN.y).abs() < 1e-12);
    }
}
