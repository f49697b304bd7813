//! Ring assembly.
//!
//! Each edge contributes the part of its merged line between its two
//! corners. Lines that wander far from the straight corner-to-corner path
//! are reduced to what lies inside a corridor around that path, and the
//! segments are joined into a closed, valid polygon.

use std::collections::BTreeMap;

use community_polygon_boundary_models::FeatureType;
use community_polygon_geometry::{
    Coord, LineString, MultiPolygon, Polygon,
    clip::{along_axis, axis_coverage, clip_lines, corridor},
    distance,
    frame::LocalFrame,
    line::{LineExt, straight},
    merge::merge_lines,
    polygon::{bounds, close_ring, is_valid, largest_part, repair},
};
use strum_macros::{AsRefStr, Display};

use crate::{
    REFERENCE, ReconstructError,
    config::RingConfig,
    merge::MergedEdgeLine,
    resolve::ResolvedEdge,
    sources::SecondarySource,
};

/// Corners closer than this along the line are treated as one location.
const SAME_LOCATION_M: f64 = 1.0;

/// Snap tolerance when rejoining pieces split by the corridor clip.
const PIECE_SNAP_M: f64 = 0.5;

/// How a ring segment was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SegmentKind {
    /// The merged line between its corners.
    Clipped,
    /// The merged line clipped to the corridor between its corners.
    Corridor,
    /// Secondary-source road geometry in the corridor.
    SecondaryCorridor,
    /// A straight line between the corners.
    Straight,
}

/// One edge's share of the ring, running from its first corner to its
/// second, in the local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RingSegment {
    pub edge_index: usize,
    pub line: LineString<f64>,
    pub kind: SegmentKind,
}

/// A closed ring, in the local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedRing {
    pub polygon: Polygon<f64>,
    /// The ring self-intersected and was repaired.
    pub repaired: bool,
}

/// Builds ring segments and closes them into a polygon.
pub struct RingAssembler<'a> {
    secondary: Option<&'a dyn SecondarySource>,
    frame: &'a LocalFrame,
    config: &'a RingConfig,
}

impl<'a> RingAssembler<'a> {
    #[must_use]
    pub const fn new(
        secondary: Option<&'a dyn SecondarySource>,
        frame: &'a LocalFrame,
        config: &'a RingConfig,
    ) -> Self {
        Self {
            secondary,
            frame,
            config,
        }
    }

    /// Builds a segment for every edge whose bounding corners are both
    /// known. Edge `i` runs from `corners[i - 1]` to `corners[i]`.
    pub async fn segments(
        &self,
        edges: &[ResolvedEdge],
        lines: &[Option<MergedEdgeLine>],
        corners: &[Option<Coord<f64>>],
    ) -> Vec<RingSegment> {
        let n = edges.len();
        let mut segments = Vec::with_capacity(n);
        for (idx, edge) in edges.iter().enumerate() {
            let (Some(prev), Some(next)) = (corners[(idx + n - 1) % n], corners[idx]) else {
                log::warn!("{}: missing a bounding corner, bridging straight", edge.name());
                continue;
            };
            let line = lines.get(idx).and_then(Option::as_ref);
            segments.push(self.segment_for(idx, edge, line, prev, next).await);
        }
        segments
    }

    /// The part of `line` between corners `prev` and `next`.
    pub async fn segment_for(
        &self,
        edge_index: usize,
        edge: &ResolvedEdge,
        line: Option<&MergedEdgeLine>,
        prev: Coord<f64>,
        next: Coord<f64>,
    ) -> RingSegment {
        let segment = |line, kind| RingSegment {
            edge_index,
            line,
            kind,
        };
        let straight_segment = || segment(straight(prev, next), SegmentKind::Straight);

        let Some(merged) = line.filter(|m| m.line.length_m() >= self.config.short_line_m) else {
            log::debug!("{}: no usable line, using a straight segment", edge.name());
            return straight_segment();
        };
        let line = &merged.line;

        let (from, to) = (line.project(prev), line.project(next));
        if (from - to).abs() < SAME_LOCATION_M {
            log::debug!("{}: corners project to the same place", edge.name());
            return straight_segment();
        }

        let mut sub = line.substring(from, to);
        if let Some(first) = sub.0.first_mut() {
            *first = prev;
        }
        if let Some(last) = sub.0.last_mut() {
            *last = next;
        }

        let direct = distance(prev, next);
        if sub.length_m() <= self.config.detour_ratio * direct {
            return segment(sub, SegmentKind::Clipped);
        }

        log::info!(
            "{}: {:.0} m between corners {:.0} m apart, clipping to corridor",
            edge.name(),
            sub.length_m(),
            direct
        );
        let region = corridor(prev, next, self.config.corridor_half_width_m);
        let pieces = clip_to_corridor(std::slice::from_ref(line), &region);
        let needed = self.config.corridor_coverage * direct;

        if axis_coverage(&pieces, prev, next) >= needed {
            return segment(stitch(&pieces, prev, next), SegmentKind::Corridor);
        }

        if pieces.is_empty()
            && edge.feature_type() == FeatureType::Street
            && let Some(secondary) = self.secondary
            && let Some(pieces) = self.secondary_corridor(secondary, &region, prev, next).await
        {
            return segment(stitch(&pieces, prev, next), SegmentKind::SecondaryCorridor);
        }

        log::warn!("{}: corridor holds too little of the line, using a straight segment", edge.name());
        straight_segment()
    }

    /// The secondary-source road that spans the most of the corridor.
    async fn secondary_corridor(
        &self,
        secondary: &dyn SecondarySource,
        region: &MultiPolygon<f64>,
        prev: Coord<f64>,
        next: Coord<f64>,
    ) -> Option<Vec<LineString<f64>>> {
        let bounds = bounds(region)?;
        let lines = match secondary
            .named_lines_in(FeatureType::Street, &self.frame.rect_to_wgs84(&bounds))
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("Secondary corridor query failed: {e}");
                return None;
            }
        };

        let mut groups: BTreeMap<String, Vec<LineString<f64>>> = BTreeMap::new();
        for line in lines {
            let Some(name) = line.name else { continue };
            groups
                .entry(name)
                .or_default()
                .push(self.frame.line_to_local(&line.line));
        }

        let reach = |pieces: &[LineString<f64>]| {
            pieces
                .iter()
                .map(|p| p.distance_to(REFERENCE))
                .fold(f64::INFINITY, f64::min)
        };
        let (name, pieces, coverage) = groups
            .into_iter()
            .map(|(name, lines)| {
                let pieces = clip_to_corridor(&lines, region);
                let coverage = axis_coverage(&pieces, prev, next);
                (name, pieces, coverage)
            })
            .filter(|(_, pieces, _)| !pieces.is_empty())
            .max_by(|a, b| {
                a.2.total_cmp(&b.2)
                    .then_with(|| reach(&b.1).total_cmp(&reach(&a.1)))
            })?;

        if coverage < self.config.corridor_coverage * distance(prev, next) {
            log::debug!("Best secondary road in corridor ({name}) covers only {coverage:.0} m");
            return None;
        }
        log::info!("Using {name} from the secondary source for the corridor ({coverage:.0} m)");
        Some(pieces)
    }

    /// Joins segments into a closed polygon, repairing self-intersections.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructError::RingConstructionFailed`] if there are no
    /// segments, too few distinct points, or the repair leaves nothing.
    pub fn close(&self, segments: &[RingSegment]) -> Result<ClosedRing, ReconstructError> {
        if segments.is_empty() {
            return Err(ReconstructError::RingConstructionFailed {
                reason: "no ring segments".to_string(),
            });
        }

        let mut coords: Vec<Coord<f64>> = Vec::new();
        for c in segments.iter().flat_map(|s| s.line.0.iter()) {
            if coords.last().is_none_or(|last| distance(*last, *c) > 1e-9) {
                coords.push(*c);
            }
        }
        let ring = close_ring(coords);
        if ring.0.len() < 4 {
            return Err(ReconstructError::RingConstructionFailed {
                reason: format!("only {} ring points", ring.0.len()),
            });
        }

        let polygon = Polygon::new(ring, vec![]);
        if is_valid(&polygon) {
            return Ok(ClosedRing {
                polygon,
                repaired: false,
            });
        }

        let parts = repair(&polygon);
        if parts.0.len() > 1 {
            log::warn!(
                "Ring self-intersects; repaired into {} parts, keeping the largest",
                parts.0.len()
            );
        } else {
            log::warn!("Ring self-intersects; repaired");
        }
        let polygon = largest_part(&parts).ok_or_else(|| ReconstructError::RingConstructionFailed {
            reason: "repair left no polygon".to_string(),
        })?;
        Ok(ClosedRing {
            polygon,
            repaired: true,
        })
    }
}

fn clip_to_corridor(lines: &[LineString<f64>], region: &MultiPolygon<f64>) -> Vec<LineString<f64>> {
    merge_lines(&clip_lines(lines, region), PIECE_SNAP_M)
}

/// Joins corridor pieces into one line from `prev` to `next`, ordered
/// along the corridor axis.
fn stitch(pieces: &[LineString<f64>], prev: Coord<f64>, next: Coord<f64>) -> LineString<f64> {
    let len = distance(prev, next);
    let along = |c: Coord<f64>| along_axis(prev, next, c);

    let mut ordered: Vec<(f64, Vec<Coord<f64>>)> = pieces
        .iter()
        .filter_map(|piece| {
            let (first, last) = piece.endpoints()?;
            let mut coords = piece.0.clone();
            if along(first) > along(last) {
                coords.reverse();
            }
            Some((along(first).min(along(last)), coords))
        })
        .collect();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut coords = vec![prev];
    for c in ordered.into_iter().flat_map(|(_, coords)| coords) {
        let t = along(c);
        if t > 0.0 && t < len && coords.last().is_none_or(|last| distance(*last, c) > 1e-9) {
            coords.push(c);
        }
    }
    coords.push(next);
    LineString::new(coords)
}
