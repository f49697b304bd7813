//! Clipping lines to regions and straight-line corridors.

use geo::{
    BooleanOps, Buffer, Coord, Line, LineString, MultiLineString, MultiPolygon, Rect,
    algorithm::buffer::{BufferStyle, LineCap},
};

use crate::distance;

/// Clips lines to a polygonal region, returning the pieces inside it.
#[must_use]
pub fn clip_lines(
    lines: &[LineString<f64>],
    region: &impl BooleanOps<Scalar = f64>,
) -> Vec<LineString<f64>> {
    if lines.is_empty() {
        return vec![];
    }
    let multi = MultiLineString::new(lines.to_vec());
    region
        .clip(&multi, false)
        .0
        .into_iter()
        .filter(|l| l.0.len() >= 2)
        .collect()
}

/// Clips lines to a rectangle.
#[must_use]
pub fn clip_to_rect(lines: &[LineString<f64>], rect: &Rect<f64>) -> Vec<LineString<f64>> {
    clip_lines(lines, &rect.to_polygon())
}

/// Square-capped buffer of half-width `half_width` around segment
/// `a`-`b`: a rectangle reaching `half_width` past each end.
#[must_use]
pub fn corridor(a: Coord<f64>, b: Coord<f64>, half_width: f64) -> MultiPolygon<f64> {
    Line::new(a, b).buffer_with_style(BufferStyle::new(half_width).line_cap(LineCap::Square))
}

/// Length of segment `a`-`b` covered by the projections of `pieces` onto
/// it.
///
/// Overlapping projections are counted once.
#[must_use]
pub fn axis_coverage(pieces: &[LineString<f64>], a: Coord<f64>, b: Coord<f64>) -> f64 {
    let len = distance(a, b);
    if len <= f64::EPSILON {
        return 0.0;
    }
    let u = (b - a) / len;
    let along = |c: &Coord<f64>| {
        let d = *c - a;
        d.x.mul_add(u.x, d.y * u.y).clamp(0.0, len)
    };

    let mut intervals: Vec<(f64, f64)> = pieces
        .iter()
        .filter(|p| !p.0.is_empty())
        .map(|p| {
            p.0.iter().map(along).fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
                (lo.min(t), hi.max(t))
            })
        })
        .collect();
    intervals.sort_by(|x, y| x.0.total_cmp(&y.0));

    let mut covered = 0.0;
    let mut current: Option<(f64, f64)> = None;
    for (lo, hi) in intervals {
        current = match current {
            Some((clo, chi)) if lo <= chi => Some((clo, chi.max(hi))),
            Some((clo, chi)) => {
                covered += chi - clo;
                Some((lo, hi))
            }
            None => Some((lo, hi)),
        };
    }
    if let Some((lo, hi)) = current {
        covered += hi - lo;
    }
    covered
}

/// Distance along segment `a`-`b` of the projection of `c`.
#[must_use]
pub fn along_axis(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    let len = distance(a, b);
    if len <= f64::EPSILON {
        return 0.0;
    }
    let u = (b - a) / len;
    let d = c - a;
    d.x.mul_add(u.x, d.y * u.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::LineExt;
    use geo::{Area, BoundingRect};

    #[test]
    fn clips_line_to_rect() {
        let rect = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
        let lines = vec![LineString::from(vec![(-5.0, 5.0), (15.0, 5.0)])];
        let clipped = clip_to_rect(&lines, &rect);
        assert_eq!(clipped.len(), 1);
        assert!((clipped[0].length_m() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn corridor_covers_segment_with_caps() {
        let region = corridor(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 0.0 }, 10.0);
        let bounds = region.bounding_rect().unwrap();
        assert!((bounds.min().x + 10.0).abs() < 1e-3);
        assert!((bounds.max().x - 110.0).abs() < 1e-3);
        assert!((bounds.max().y - 10.0).abs() < 1e-3);
        assert!((region.unsigned_area() - 120.0 * 20.0).abs() < 1e-2);
    }

    #[test]
    fn corridor_clip_keeps_the_part_near_the_axis() {
        let region = corridor(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 0.0 }, 10.0);
        let lines = vec![LineString::from(vec![(50.0, -40.0), (50.0, 40.0)])];
        let pieces = clip_lines(&lines, &region);
        assert_eq!(pieces.len(), 1);
        assert!((pieces[0].length_m() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn coverage_unions_overlaps() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 100.0, y: 0.0 };
        let pieces = vec![
            LineString::from(vec![(0.0, 1.0), (30.0, 2.0)]),
            LineString::from(vec![(20.0, -1.0), (40.0, 0.0)]),
            LineString::from(vec![(80.0, 0.0), (150.0, 0.0)]),
        ];
        assert!((axis_coverage(&pieces, a, b) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn along_axis_projects() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 0.0, y: 10.0 };
        assert!((along_axis(a, b, Coord { x: 3.0, y: 4.0 }) - 4.0).abs() < 1e-9);
    }
}
