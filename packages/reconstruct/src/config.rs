//! Reconstruction tuning.
//!
//! Every empirical threshold used by the pipeline lives here. Defaults are
//! tuned for Toronto's layers and mirrored in `config/default.toml`, which
//! doubles as a template for custom files; any key omitted from a custom
//! file keeps its default.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::ReconstructError;

/// The documented default configuration file.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("Royal York Road", "Royal York Rd"),
    ("Royal York", "Royal York Rd"),
    ("Bloor Street West", "Bloor St W"),
    ("Bloor Street", "Bloor St W"),
    ("Bloor", "Bloor St W"),
    ("The Kingsway", "The Kingsway"),
    ("Kingsway", "The Kingsway"),
];

/// All pipeline thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    /// Name resolution.
    #[serde(default)]
    pub resolve: ResolveConfig,
    /// Geometry fetching.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Segment merging and selection.
    #[serde(default)]
    pub merge: MergeConfig,
    /// Corner location.
    #[serde(default)]
    pub corner: CornerConfig,
    /// Ring assembly.
    #[serde(default)]
    pub ring: RingConfig,
}

impl ReconstructionConfig {
    /// Parses a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructError::Config`] if the TOML is invalid.
    pub fn from_toml(text: &str) -> Result<Self, ReconstructError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructError::Io`] if the file cannot be read or
    /// [`ReconstructError::Config`] if it is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ReconstructError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::info!("Loaded reconstruction config from {}", path.display());
        Ok(config)
    }
}

/// Name resolution thresholds and the alias table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Half-width of the envelope searched when matching names.
    pub search_radius_m: f64,
    /// Compass scoring credits a candidate's length up to this cap.
    pub length_bonus_cap_m: f64,
    /// Compass scoring bonus when the candidate runs along the edge's
    /// expected axis.
    pub orientation_bonus: f64,
    /// Radius searched around a geocoded intersection.
    pub intersection_radius_m: f64,
    /// Colloquial name to canonical name. Keys match case- and
    /// punctuation-insensitively.
    pub aliases: BTreeMap<String, String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            search_radius_m: 2_200.0,
            length_bonus_cap_m: 1_000.0,
            orientation_bonus: 500.0,
            intersection_radius_m: 300.0,
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
                .collect(),
        }
    }
}

/// Geometry fetch envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Half-width of the envelope fetched for streets.
    pub street_radius_m: f64,
    /// Half-width of the envelope fetched for waterways.
    pub waterway_radius_m: f64,
    /// Primary waterway geometry shorter than this also asks the secondary
    /// source.
    pub sparse_waterway_m: f64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            street_radius_m: 2_200.0,
            waterway_radius_m: 3_300.0,
            sparse_waterway_m: 200.0,
        }
    }
}

/// Fragment merging and component selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Padding around the bounding box shared by every edge's fragments.
    pub clip_padding_m: f64,
    /// How far past the reference point a fragment may sit and still count
    /// as on its declared side.
    pub compass_margin_m: f64,
    /// Fragment endpoints closer than this are joined.
    pub snap_tolerance_m: f64,
    /// The component nearest the reference point wins when it lies within
    /// this fraction of the clip region's diagonal.
    pub component_reach_ratio: f64,
    /// Fragments are chained when the longest component is below this
    /// share of the total length.
    pub fragmented_ratio: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            clip_padding_m: 50.0,
            compass_margin_m: 330.0,
            snap_tolerance_m: 1.0,
            component_reach_ratio: 0.5,
            fragmented_ratio: 0.4,
        }
    }
}

/// Corner location thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerConfig {
    /// A geocoded corner within this distance of both lines snaps to both.
    pub snap_both_m: f64,
    /// A geocoded corner within this distance of one line snaps to that
    /// line only.
    pub snap_one_m: f64,
    /// Length of the rays cast from each line's facing end.
    pub extrapolate_m: f64,
    /// Extrapolated corners further than this from either line are
    /// rejected.
    pub extrapolate_accept_m: f64,
    /// Number of trailing segments averaged for the outward heading.
    pub heading_window: usize,
    /// Largest closest-approach gap still accepted as a corner.
    pub nearest_max_gap_m: f64,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            snap_both_m: 500.0,
            snap_one_m: 200.0,
            extrapolate_m: 2_000.0,
            extrapolate_accept_m: 2_000.0,
            heading_window: 3,
            nearest_max_gap_m: 1_200.0,
        }
    }
}

/// Ring assembly thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Merged lines shorter than this are replaced by a straight segment.
    pub short_line_m: f64,
    /// A clipped segment longer than this multiple of the straight corner
    /// distance is treated as a detour.
    pub detour_ratio: f64,
    /// Half-width of the corridor around the straight corner segment.
    pub corridor_half_width_m: f64,
    /// Share of the straight corner distance the corridor pieces must
    /// cover.
    pub corridor_coverage: f64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            short_line_m: 110.0,
            detour_ratio: 2.5,
            corridor_half_width_m: 110.0,
            corridor_coverage: 0.5,
        }
    }
}
