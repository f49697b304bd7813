//! Linear referencing on line strings.

use geo::{
    BoundingRect, Centroid, Closest, ClosestPoint, Coord, Distance, Euclidean, Length,
    LineInterpolatePoint, LineLocatePoint, LineString, Point, Rect,
};

use crate::distance;

/// Linear referencing and measurement on a planar line.
pub trait LineExt {
    /// Total length.
    fn length_m(&self) -> f64;

    /// Distance along the line to the point closest to `p`.
    fn project(&self, p: Coord<f64>) -> f64;

    /// The point on the line closest to `p`.
    fn closest_coord(&self, p: Coord<f64>) -> Option<Coord<f64>>;

    /// Distance from `p` to the line.
    fn distance_to(&self, p: Coord<f64>) -> f64;

    /// The point at `distance` along the line (clamped to the ends).
    fn interpolate(&self, distance: f64) -> Option<Coord<f64>>;

    /// The part of the line between two distances along it.
    ///
    /// Interior vertices are kept as they are. If `from > to` the result
    /// runs backwards.
    fn substring(&self, from: f64, to: f64) -> LineString<f64>;

    /// The endpoint at the start (or end) of the line and the unit heading
    /// pointing away from the line there, averaged over the last `window`
    /// segments.
    fn outward_heading(&self, at_start: bool, window: usize) -> Option<(Coord<f64>, Coord<f64>)>;

    /// Length-weighted centre.
    fn center(&self) -> Option<Coord<f64>>;

    /// Bounding rectangle.
    fn bounds(&self) -> Option<Rect<f64>>;

    /// First and last coordinate.
    fn endpoints(&self) -> Option<(Coord<f64>, Coord<f64>)>;
}

impl LineExt for LineString<f64> {
    fn length_m(&self) -> f64 {
        Euclidean.length(self)
    }

    fn project(&self, p: Coord<f64>) -> f64 {
        self.line_locate_point(&Point::from(p))
            .map_or(0.0, |fraction| fraction * self.length_m())
    }

    fn closest_coord(&self, p: Coord<f64>) -> Option<Coord<f64>> {
        if let [only] = self.0.as_slice() {
            return Some(*only);
        }
        match self.closest_point(&Point::from(p)) {
            Closest::Intersection(point) | Closest::SinglePoint(point) => Some(point.0),
            Closest::Indeterminate => None,
        }
    }

    fn distance_to(&self, p: Coord<f64>) -> f64 {
        if self.0.is_empty() {
            return f64::INFINITY;
        }
        Euclidean.distance(self, &Point::from(p))
    }

    fn interpolate(&self, along: f64) -> Option<Coord<f64>> {
        let first = *self.0.first()?;
        let total = self.length_m();
        if along <= 0.0 || total <= f64::EPSILON {
            return Some(first);
        }
        self.line_interpolate_point(along / total)
            .map(|point| point.0)
            .or_else(|| self.0.last().copied())
    }

    fn substring(&self, from: f64, to: f64) -> LineString<f64> {
        if from > to {
            let mut forward = self.substring(to, from);
            forward.0.reverse();
            return forward;
        }
        let (Some(start), Some(end)) = (self.interpolate(from), self.interpolate(to)) else {
            return LineString::new(vec![]);
        };

        let mut coords = vec![start];
        let mut walked = 0.0;
        for (idx, coord) in self.0.iter().enumerate() {
            if idx > 0 {
                walked += distance(self.0[idx - 1], *coord);
            }
            if walked > from && walked < to {
                push_distinct(&mut coords, *coord);
            }
        }
        push_distinct(&mut coords, end);
        if coords.len() == 1 {
            coords.push(end);
        }
        LineString::new(coords)
    }

    fn outward_heading(&self, at_start: bool, window: usize) -> Option<(Coord<f64>, Coord<f64>)> {
        let n = self.0.len();
        if n < 2 {
            return None;
        }
        let span = window.clamp(1, n - 1);
        let (tip, inner) = if at_start {
            (self.0[0], self.0[span])
        } else {
            (self.0[n - 1], self.0[n - 1 - span])
        };
        let d = tip - inner;
        let len = d.x.hypot(d.y);
        if len <= f64::EPSILON {
            return None;
        }
        Some((tip, d / len))
    }

    fn center(&self) -> Option<Coord<f64>> {
        self.centroid().map(|p| p.0)
    }

    fn bounds(&self) -> Option<Rect<f64>> {
        self.bounding_rect()
    }

    fn endpoints(&self) -> Option<(Coord<f64>, Coord<f64>)> {
        Some((*self.0.first()?, *self.0.last()?))
    }
}

fn push_distinct(coords: &mut Vec<Coord<f64>>, c: Coord<f64>) {
    if coords.last().is_none_or(|last| distance(*last, c) > 1e-9) {
        coords.push(c);
    }
}

/// Straight two-point line.
#[must_use]
pub fn straight(a: Coord<f64>, b: Coord<f64>) -> LineString<f64> {
    LineString::new(vec![a, b])
}
