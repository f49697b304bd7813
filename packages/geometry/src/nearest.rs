//! Intersections and nearest points between lines.

use geo::{
    Coord, Line, LineString,
    line_intersection::{LineIntersection, line_intersection},
};

use crate::{distance, line::LineExt};

const DEDUP_EPSILON: f64 = 1e-6;

/// Where two segments meet, if they do. A collinear overlap reports the
/// start of the shared part.
#[must_use]
pub fn segment_crossing(a: Line<f64>, b: Line<f64>) -> Option<Coord<f64>> {
    match line_intersection(a, b)? {
        LineIntersection::SinglePoint { intersection, .. } => Some(intersection),
        LineIntersection::Collinear { intersection } => Some(intersection.start),
    }
}

/// All points where two lines cross or touch, de-duplicated.
#[must_use]
pub fn intersection_points(a: &LineString<f64>, b: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut points: Vec<Coord<f64>> = Vec::new();
    for p in a
        .lines()
        .flat_map(|sa| b.lines().filter_map(move |sb| segment_crossing(sa, sb)))
    {
        if !points.iter().any(|q| distance(*q, p) < DEDUP_EPSILON) {
            points.push(p);
        }
    }
    points
}

/// A pair of points, one on each line, with the distance between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPair {
    /// Point on the first line.
    pub on_a: Coord<f64>,
    /// Point on the second line.
    pub on_b: Coord<f64>,
    /// Distance between the two points.
    pub gap: f64,
}

impl NearestPair {
    /// Midpoint of the pair.
    #[must_use]
    pub fn midpoint(&self) -> Coord<f64> {
        crate::midpoint(self.on_a, self.on_b)
    }
}

/// Closest pair of points between two lines, checking every vertex of
/// each line against the other line.
#[must_use]
pub fn nearest_pair(a: &LineString<f64>, b: &LineString<f64>) -> Option<NearestPair> {
    let forward = a.0.iter().filter_map(|&va| {
        b.closest_coord(va).map(|vb| NearestPair {
            on_a: va,
            on_b: vb,
            gap: distance(va, vb),
        })
    });
    let backward = b.0.iter().filter_map(|&vb| {
        a.closest_coord(vb).map(|va| NearestPair {
            on_a: va,
            on_b: vb,
            gap: distance(va, vb),
        })
    });
    forward.chain(backward).min_by(|x, y| x.gap.total_cmp(&y.gap))
}

/// Closest pair formed by snapping the endpoints of each line onto the
/// other line.
#[must_use]
pub fn endpoint_snap_pair(a: &LineString<f64>, b: &LineString<f64>) -> Option<NearestPair> {
    let (a0, a1) = a.endpoints()?;
    let (b0, b1) = b.endpoints()?;
    let from_a = [a0, a1].into_iter().filter_map(|va| {
        b.closest_coord(va).map(|vb| NearestPair {
            on_a: va,
            on_b: vb,
            gap: distance(va, vb),
        })
    });
    let from_b = [b0, b1].into_iter().filter_map(|vb| {
        a.closest_coord(vb).map(|va| NearestPair {
            on_a: va,
            on_b: vb,
            gap: distance(va, vb),
        })
    });
    from_a.chain(from_b).min_by(|x, y| x.gap.total_cmp(&y.gap))
}

/// The endpoint of `line` closest to `other`, with a flag that is `true`
/// when it is the start of the line.
#[must_use]
pub fn endpoint_facing(line: &LineString<f64>, other: &LineString<f64>) -> Option<bool> {
    let (first, last) = line.endpoints()?;
    Some(other.distance_to(first) <= other.distance_to(last))
}

/// Point `length` along the unit direction `dir` from `from`.
#[must_use]
pub fn ray_end(from: Coord<f64>, dir: Coord<f64>, length: f64) -> Coord<f64> {
    from + dir * length
}

/// The point among `points` nearest `target`.
#[must_use]
pub fn nearest_to(points: &[Coord<f64>], target: Coord<f64>) -> Option<Coord<f64>> {
    points
        .iter()
        .copied()
        .min_by(|a, b| distance(*a, target).total_cmp(&distance(*b, target)))
}
