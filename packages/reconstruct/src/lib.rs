#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Community perimeter reconstruction.
//!
//! Turns a colloquial boundary description ("west of Royal York, south of
//! Bloor, bounded west and south by Mimico Creek") into a closed polygon.
//! The stages run in order over every edge:
//!
//! 1. [`resolve`]: bind each described name to a canonical primary-source
//!    name.
//! 2. [`fetch`]: pull raw line fragments, falling back to the secondary
//!    source.
//! 3. [`merge`]: reduce the fragments to one line per edge.
//! 4. [`corner`]: find where adjacent edges meet.
//! 5. [`ring`]: cut each line between its corners and close the ring.
//!
//! When the description names a zoning exception, the [`zoning`] union of
//! its parcels is built as well and [`compare`]d with the traced outline.
//!
//! Two point queries sit beside the reconstruction: [`lookup`] reports the
//! zoning, planning and administrative areas containing a point, and
//! [`check`] tests whether a point lies on the described side of every
//! boundary line.
//!
//! All geometry between stages is in a local metric frame centred on the
//! reference point (see [`community_polygon_geometry::frame`]), so the
//! reference point is always the origin.

pub mod check;
pub mod compare;
pub mod config;
pub mod corner;
pub mod error;
pub mod fetch;
pub mod lookup;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod resolve;
pub mod ring;
pub mod sources;
pub mod zoning;

#[cfg(test)]
mod testing;

use community_polygon_geometry::Coord;

pub use check::{BoundaryCheck, Verdict};
pub use config::ReconstructionConfig;
pub use error::{ReconstructError, SourceError};
pub use lookup::{LocationProfile, profile};
pub use output::Reconstruction;
pub use pipeline::{Approach, Reconstructor};

/// The reference point in the local frame.
pub(crate) const REFERENCE: Coord<f64> = Coord { x: 0.0, y: 0.0 };
