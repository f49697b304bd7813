#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary description types.
//!
//! A community perimeter is described colloquially as an ordered list of
//! named streets and waterways, each with the compass side of the
//! community's reference point on which it lies ("west of Royal York,
//! south of Bloor, bounded west and south by Mimico Creek"). These types
//! are the JSON schema for such descriptions.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Locality appended to geocoder queries when a description omits one.
pub const DEFAULT_LOCALITY: &str = "Toronto, ON";

/// Default half-width of the zoning parcel search, in meters.
pub const DEFAULT_ZONING_RADIUS_M: f64 = 1_650.0;

/// Kind of line feature forming a boundary edge.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FeatureType {
    /// A named road centreline.
    Street,
    /// A named creek, river or other watercourse.
    Waterway,
}

/// Axis along which a boundary edge is expected to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The edge runs east-west (it bounds the community to the north or
    /// south).
    EastWest,
    /// The edge runs north-south (it bounds the community to the east or
    /// west).
    NorthSouth,
}

/// Side of the community's reference point on which a boundary edge lies.
///
/// "South of Bloor" means Bloor lies to the *north* of the community, so
/// the edge for Bloor carries [`CompassDirection::North`]. Diagonal roles
/// ("bounded west and south by the creek") are satisfied when either of
/// their component sides is.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CompassDirection {
    /// North of the reference point.
    North,
    /// South of the reference point.
    South,
    /// East of the reference point.
    East,
    /// West of the reference point.
    West,
    /// North and/or east of the reference point.
    #[serde(alias = "northeast", alias = "north_and_east", alias = "east_and_north")]
    #[strum(
        to_string = "north_east",
        serialize = "northeast",
        serialize = "north_and_east",
        serialize = "east_and_north"
    )]
    NorthEast,
    /// North and/or west of the reference point.
    #[serde(alias = "northwest", alias = "north_and_west", alias = "west_and_north")]
    #[strum(
        to_string = "north_west",
        serialize = "northwest",
        serialize = "north_and_west",
        serialize = "west_and_north"
    )]
    NorthWest,
    /// South and/or east of the reference point.
    #[serde(alias = "southeast", alias = "south_and_east", alias = "east_and_south")]
    #[strum(
        to_string = "south_east",
        serialize = "southeast",
        serialize = "south_and_east",
        serialize = "east_and_south"
    )]
    SouthEast,
    /// South and/or west of the reference point.
    #[serde(alias = "southwest", alias = "south_and_west", alias = "west_and_south")]
    #[strum(
        to_string = "south_west",
        serialize = "southwest",
        serialize = "south_and_west",
        serialize = "west_and_south"
    )]
    SouthWest,
}

impl CompassDirection {
    const fn north(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    const fn south(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }

    const fn east(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    const fn west(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    /// Axis the edge is expected to run along, if the role is a single
    /// cardinal side.
    #[must_use]
    pub const fn running_axis(self) -> Option<Axis> {
        match self {
            Self::North | Self::South => Some(Axis::EastWest),
            Self::East | Self::West => Some(Axis::NorthSouth),
            _ => None,
        }
    }

    /// Returns `true` if a point offset `(dx, dy)` meters (x east, y north)
    /// from the reference point lies on this side, allowing `margin` meters
    /// of overshoot onto the opposite side.
    #[must_use]
    pub fn admits(self, dx: f64, dy: f64, margin: f64) -> bool {
        (self.north() && dy > -margin)
            || (self.south() && dy < margin)
            || (self.east() && dx > -margin)
            || (self.west() && dx < margin)
    }
}

/// One named street or waterway forming part of the perimeter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEdge {
    /// Street or waterway.
    pub feature_type: FeatureType,
    /// User-facing name (e.g. "Royal York Road", "Mimico Creek").
    pub feature_name: String,
    /// Side of the reference point on which this edge lies, if stated.
    #[serde(default)]
    pub compass_direction: Option<CompassDirection>,
    /// Position in the perimeter. Defaults to the position in the file.
    #[serde(default)]
    pub sequence_index: Option<usize>,
}

impl BoundaryEdge {
    /// Creates an edge with no explicit sequence index.
    #[must_use]
    pub fn new(
        feature_type: FeatureType,
        feature_name: impl Into<String>,
        compass_direction: Option<CompassDirection>,
    ) -> Self {
        Self {
            feature_type,
            feature_name: feature_name.into(),
            compass_direction,
            sequence_index: None,
        }
    }
}

/// Point known to lie inside the community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferencePoint {
    /// WGS84 coordinates.
    Coordinates {
        /// Latitude.
        lat: f64,
        /// Longitude.
        lon: f64,
    },
    /// A street address to geocode.
    Address {
        /// Full street address.
        address: String,
    },
}

/// Independent cross-check: the union of zoning parcels carrying a
/// by-law exception number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoningExceptionDescriptor {
    /// Exception number (e.g. `42` for "x42").
    pub exception_number: u32,
    /// Zone category filter (e.g. `"RD"`). Exception numbers are reused
    /// across zone types city-wide, so this is usually needed.
    #[serde(default)]
    pub zone_type: Option<String>,
    /// Half-width of the parcel search envelope, in meters.
    #[serde(default = "default_zoning_radius")]
    pub radius_m: f64,
}

const fn default_zoning_radius() -> f64 {
    DEFAULT_ZONING_RADIUS_M
}

fn default_locality() -> String {
    DEFAULT_LOCALITY.to_string()
}

/// A complete perimeter description, as read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryDescription {
    /// Community name (e.g. "Thompson Orchard").
    pub community_name: String,
    /// Free-text description the edges were derived from.
    #[serde(default)]
    pub description: Option<String>,
    /// City/province context appended to geocoder queries.
    #[serde(default = "default_locality")]
    pub locality: String,
    /// Perimeter edges, in order around the community.
    pub boundaries: Vec<BoundaryEdge>,
    /// Point inside the community.
    #[serde(default)]
    pub reference_point: Option<ReferencePoint>,
    /// Optional zoning-union cross-check.
    #[serde(default)]
    pub zoning_exception: Option<ZoningExceptionDescriptor>,
}

impl BoundaryDescription {
    /// Checks the structural invariants of the description.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError`] if fewer than two edges are given, an
    /// edge has an empty name, or two edges claim the same sequence index.
    pub fn validate(&self) -> Result<(), DescriptionError> {
        if self.boundaries.len() < 2 {
            return Err(DescriptionError::TooFewEdges {
                count: self.boundaries.len(),
            });
        }
        for (idx, edge) in self.boundaries.iter().enumerate() {
            if edge.feature_name.trim().is_empty() {
                return Err(DescriptionError::EmptyName { index: idx });
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for edge in &self.boundaries {
            if let Some(seq) = edge.sequence_index
                && !seen.insert(seq)
            {
                return Err(DescriptionError::DuplicateSequence { index: seq });
            }
        }
        Ok(())
    }

    /// Returns the edges in perimeter order, with every `sequence_index`
    /// filled in.
    ///
    /// Edges without an explicit index keep their file position.
    #[must_use]
    pub fn ordered_edges(&self) -> Vec<BoundaryEdge> {
        let mut edges: Vec<(usize, BoundaryEdge)> = self
            .boundaries
            .iter()
            .enumerate()
            .map(|(pos, edge)| (edge.sequence_index.unwrap_or(pos), edge.clone()))
            .collect();
        edges.sort_by_key(|(seq, _)| *seq);
        edges
            .into_iter()
            .enumerate()
            .map(|(idx, (_, mut edge))| {
                edge.sequence_index = Some(idx);
                edge
            })
            .collect()
    }
}

/// A description that violates the perimeter invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionError {
    /// A perimeter needs at least two edges.
    TooFewEdges {
        /// Number of edges found.
        count: usize,
    },
    /// An edge has a blank `feature_name`.
    EmptyName {
        /// File position of the offending edge.
        index: usize,
    },
    /// Two edges share a `sequence_index`.
    DuplicateSequence {
        /// The repeated index.
        index: usize,
    },
}

impl std::fmt::Display for DescriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewEdges { count } => {
                write!(f, "a perimeter needs at least 2 edges, found {count}")
            }
            Self::EmptyName { index } => write!(f, "boundary {index} has an empty feature_name"),
            Self::DuplicateSequence { index } => {
                write!(f, "sequence_index {index} is used by more than one boundary")
            }
        }
    }
}

impl std::error::Error for DescriptionError {}
