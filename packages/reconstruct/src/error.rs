//! Reconstruction errors.

use community_polygon_arcgis::ArcGisError;
use community_polygon_boundary_models::DescriptionError;
use community_polygon_geocoder::GeocodeError;
use community_polygon_http::HttpError;
use community_polygon_overpass::OverpassError;
use thiserror::Error;

/// Errors from a geodata source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The primary (`ArcGIS`) source failed.
    #[error("Primary source: {0}")]
    Primary(#[from] ArcGisError),

    /// The secondary (Overpass) source failed.
    #[error("Secondary source: {0}")]
    Secondary(#[from] OverpassError),

    /// Any other source implementation failed.
    #[error("{source_name}: {message}")]
    Other {
        /// Source that failed.
        source_name: String,
        /// What went wrong.
        message: String,
    },
}

/// Errors from reconstruction.
///
/// Per-edge and per-corner failures ([`Self::NoGeometryFound`],
/// [`Self::AllSourcesExhausted`], [`Self::CornerNotFound`]) are logged and
/// absorbed by the pipeline; they only surface from the individual stages.
#[derive(Debug, Error)]
pub enum ReconstructError {
    /// The description violates the perimeter invariants.
    #[error("Invalid description: {0}")]
    Description(#[from] DescriptionError),

    /// The description has no reference point.
    #[error("No reference point: give coordinates or an address")]
    NoReferencePoint,

    /// The reference address did not geocode.
    #[error("Reference address not found: {address}")]
    ReferenceNotFound {
        /// The address that was geocoded.
        address: String,
    },

    /// The primary source has no geometry for an edge and no secondary
    /// source is available.
    #[error("No geometry found for {edge}: {reason}")]
    NoGeometryFound {
        /// Edge name.
        edge: String,
        /// Why the primary source came up empty.
        reason: String,
    },

    /// Both sources were tried for an edge and neither had geometry.
    #[error("All sources exhausted for {edge} (primary: {primary}; secondary: {secondary})")]
    AllSourcesExhausted {
        /// Edge name.
        edge: String,
        /// Primary source outcome.
        primary: String,
        /// Secondary source outcome.
        secondary: String,
    },

    /// No strategy located the corner between two adjacent edges.
    #[error("No corner found between {first} and {second}")]
    CornerNotFound {
        /// First edge name.
        first: String,
        /// Second edge name.
        second: String,
    },

    /// The ring could not be built.
    #[error("Ring construction failed: {reason}")]
    RingConstructionFailed {
        /// What was missing.
        reason: String,
    },

    /// No zoning parcels carry the requested exception.
    #[error("No zoning parcels found for exception {exception_number}")]
    NoZoningParcels {
        /// Requested exception number.
        exception_number: u32,
    },

    /// A geodata source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Geocoding failed.
    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    /// HTTP request failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is invalid.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
