#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Planar geometry primitives for boundary reconstruction.
//!
//! Everything the reconstruction pipeline needs from a 2D geometry library
//! goes through this crate: a local metric [`frame`] around the reference
//! point, [`line`] projection and sub-line extraction, [`merge`] of
//! fragmented centrelines, [`clip`]ping to regions and corridors,
//! [`nearest`] points and intersections, and [`polygon`] closure and
//! repair. The underlying engine is `geo`; callers only see `geo-types`
//! values and the functions here.
//!
//! All functions assume planar coordinates in meters (see
//! [`frame::LocalFrame`]).

pub mod clip;
pub mod frame;
pub mod line;
pub mod merge;
pub mod nearest;
pub mod polygon;

pub use geo::{Coord, LineString, MultiPolygon, Point, Polygon, Rect};

use geo::{Euclidean, line_measures::Distance};

/// Euclidean distance between two coordinates.
#[must_use]
pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Euclidean.distance(&Point::from(a), &Point::from(b))
}

/// Midpoint of two coordinates.
#[must_use]
pub fn midpoint(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    Coord {
        x: f64::midpoint(a.x, b.x),
        y: f64::midpoint(a.y, b.y),
    }
}

/// Diagonal length of a rectangle.
#[must_use]
pub fn diagonal(rect: &Rect<f64>) -> f64 {
    distance(rect.min(), rect.max())
}
