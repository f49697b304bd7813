//! Compile-time registry of `ArcGIS` layer sets.
//!
//! A layer set names the feature services a city publishes for road
//! centrelines, watercourses and zoning parcels, with the attribute fields
//! that hold feature names and zoning codes, plus the polygon layers a
//! point can be looked up in (zoning, wards, neighbourhoods). Each set is a
//! TOML file under `layers/`, embedded via `include_str!`.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Number of registered layer sets. Enforced by a test.
#[cfg(test)]
const EXPECTED_LAYER_SET_COUNT: usize = 1;

/// Embedded TOML layer set definitions.
const LAYER_SET_TOMLS: &[(&str, &str)] = &[("toronto", include_str!("../layers/toronto.toml"))];

/// Layer set used when none is requested.
pub const DEFAULT_LAYER_SET: &str = "toronto";

/// One city's feature services.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerSet {
    /// Unique identifier (e.g. `"toronto"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// REST services root, e.g. `https://gis.example.com/arcgis/rest/services`.
    pub base_url: String,
    /// Page size requested from the server.
    #[serde(default = "default_max_record_count")]
    pub max_record_count: u32,
    /// Road centreline layer.
    pub roads: LineLayer,
    /// Watercourse layer.
    pub waterlines: LineLayer,
    /// Zoning parcel layer.
    pub zoning: ZoningLayer,
    /// Polygon layers queried by point, in report order.
    #[serde(default)]
    pub lookups: Vec<LookupLayer>,
}

/// A line layer with a name attribute.
#[derive(Debug, Clone, Deserialize)]
pub struct LineLayer {
    /// Human-readable layer name, used in errors.
    pub name: String,
    /// Path below `base_url`, e.g. `cot_geospatial2/FeatureServer/2`.
    pub service: String,
    /// Attribute holding the feature name.
    pub name_field: String,
}

/// A zoning parcel polygon layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoningLayer {
    /// Human-readable layer name, used in errors.
    pub name: String,
    /// Path below `base_url`.
    pub service: String,
    /// Attribute holding the exception number.
    pub exception_field: String,
    /// Attribute holding the zone category.
    pub zone_field: String,
    /// Attributes requested with each parcel.
    #[serde(default)]
    pub out_fields: Vec<String>,
}

/// A polygon layer answering "which area contains this point".
#[derive(Debug, Clone, Deserialize)]
pub struct LookupLayer {
    /// Stable key (e.g. `"ward"`).
    pub id: String,
    /// Human-readable layer name, used in errors.
    pub name: String,
    /// Path below `base_url`.
    pub service: String,
    /// Output label to candidate attributes; the first non-empty one wins.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
    /// Label shown when summarizing a hit.
    pub summary: Option<String>,
    /// A point outside every polygon of this layer is unexpected (the
    /// layer tiles the whole city) rather than a plain "not in this area".
    #[serde(default)]
    pub covers_city: bool,
}

const fn default_max_record_count() -> u32 {
    1000
}

impl LayerSet {
    /// Query endpoint URL for a service path.
    #[must_use]
    pub fn query_url(&self, service: &str) -> String {
        format!(
            "{}/{}/query",
            self.base_url.trim_end_matches('/'),
            service.trim_matches('/')
        )
    }

    /// Looks up a point layer by id.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&LookupLayer> {
        self.lookups.iter().find(|layer| layer.id == id)
    }
}

/// Returns all registered layer sets.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught by the tests below.
#[must_use]
pub fn all_layer_sets() -> Vec<LayerSet> {
    LAYER_SET_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse ArcGIS layer set '{name}': {e}"))
        })
        .collect()
}

/// Looks up a layer set by id.
#[must_use]
pub fn layer_set(id: &str) -> Option<LayerSet> {
    all_layer_sets().into_iter().find(|set| set.id == id)
}
