//! Ring closure, validity and repair.

use geo::{
    Area, BooleanOps, BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon,
    Rect, Validation,
};

use crate::distance;

/// Closes a coordinate sequence into a ring (first == last).
#[must_use]
pub fn close_ring(mut coords: Vec<Coord<f64>>) -> LineString<f64> {
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied())
        && distance(first, last) > 0.0
    {
        coords.push(first);
    }
    LineString::new(coords)
}

/// Returns `true` if the polygon is valid: enough distinct points and no
/// ring crossing itself.
#[must_use]
pub fn is_valid(polygon: &Polygon<f64>) -> bool {
    let problems = polygon.validation_errors();
    for problem in &problems {
        log::debug!("Invalid ring: {problem}");
    }
    problems.is_empty()
}

/// Repairs a self-intersecting polygon by unioning it with itself,
/// splitting it at its self-intersections.
#[must_use]
pub fn repair(polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    geo::unary_union(std::iter::once(polygon))
}

/// Unions a set of polygons.
#[must_use]
pub fn union_all(polygons: &[Polygon<f64>]) -> MultiPolygon<f64> {
    geo::unary_union(polygons.iter())
}

/// Part with the largest area.
#[must_use]
pub fn largest_part(parts: &MultiPolygon<f64>) -> Option<Polygon<f64>> {
    parts
        .0
        .iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
        .cloned()
}

/// Part containing `point`, if any.
#[must_use]
pub fn part_containing(parts: &MultiPolygon<f64>, point: Coord<f64>) -> Option<Polygon<f64>> {
    let point = Point::from(point);
    parts.0.iter().find(|p| p.contains(&point)).cloned()
}

/// Bounding rectangle of a set of polygons.
#[must_use]
pub fn bounds(parts: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    parts.bounding_rect()
}

/// Unsigned area.
#[must_use]
pub fn area(polygon: &Polygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Returns `true` if `point` lies strictly inside the polygon.
#[must_use]
pub fn contains(polygon: &Polygon<f64>, point: Coord<f64>) -> bool {
    polygon.contains(&Point::from(point))
}

/// Areas of the intersection and union of two polygons.
#[must_use]
pub fn overlap(a: &Polygon<f64>, b: &Polygon<f64>) -> (f64, f64) {
    let inter = a.intersection(b).unsigned_area();
    let union = a.union(b).unsigned_area();
    (inter, union)
}
