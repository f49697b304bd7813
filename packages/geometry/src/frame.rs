//! Local planar frame centred on a reference point.
//!
//! Sources speak WGS84 (x = longitude, y = latitude). The reconstruction
//! core works in an equirectangular projection around the community's
//! reference point, in meters with x east and y north. At community scale
//! (a few kilometers) the distortion is negligible.

use geo::{Coord, LineString, MapCoords, Polygon, Rect};

/// Meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Equirectangular projection around an origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    origin: Coord<f64>,
    cos_lat: f64,
}

impl LocalFrame {
    /// Creates a frame centred on `origin` (x = longitude, y = latitude).
    #[must_use]
    pub fn new(origin: Coord<f64>) -> Self {
        Self {
            origin,
            cos_lat: origin.y.to_radians().cos(),
        }
    }

    /// The frame origin in WGS84.
    #[must_use]
    pub const fn origin(&self) -> Coord<f64> {
        self.origin
    }

    /// Projects a WGS84 coordinate into the local frame.
    #[must_use]
    pub fn to_local(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (c.x - self.origin.x) * METERS_PER_DEGREE * self.cos_lat,
            y: (c.y - self.origin.y) * METERS_PER_DEGREE,
        }
    }

    /// Converts a local coordinate back to WGS84.
    #[must_use]
    pub fn to_wgs84(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: c.x / (METERS_PER_DEGREE * self.cos_lat) + self.origin.x,
            y: c.y / METERS_PER_DEGREE + self.origin.y,
        }
    }

    /// Projects a WGS84 line into the local frame.
    #[must_use]
    pub fn line_to_local(&self, line: &LineString<f64>) -> LineString<f64> {
        line.map_coords(|c| self.to_local(c))
    }

    /// Converts a local line back to WGS84.
    #[must_use]
    pub fn line_to_wgs84(&self, line: &LineString<f64>) -> LineString<f64> {
        line.map_coords(|c| self.to_wgs84(c))
    }

    /// Projects a WGS84 polygon into the local frame.
    #[must_use]
    pub fn polygon_to_local(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        polygon.map_coords(|c| self.to_local(c))
    }

    /// Converts a local polygon back to WGS84.
    #[must_use]
    pub fn polygon_to_wgs84(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        polygon.map_coords(|c| self.to_wgs84(c))
    }

    /// WGS84 envelope of the square of half-width `half_width_m` meters
    /// centred on the local coordinate `center`.
    #[must_use]
    pub fn envelope(&self, center: Coord<f64>, half_width_m: f64) -> Rect<f64> {
        let min = self.to_wgs84(Coord {
            x: center.x - half_width_m,
            y: center.y - half_width_m,
        });
        let max = self.to_wgs84(Coord {
            x: center.x + half_width_m,
            y: center.y + half_width_m,
        });
        Rect::new(min, max)
    }

    /// WGS84 envelope of a local rectangle.
    #[must_use]
    pub fn rect_to_wgs84(&self, rect: &Rect<f64>) -> Rect<f64> {
        Rect::new(self.to_wgs84(rect.min()), self.to_wgs84(rect.max()))
    }
}
