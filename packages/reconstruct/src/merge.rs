//! Segment merging and selection.
//!
//! Turns an edge's raw fragments into one representative line:
//! clip to the region shared by all edges, drop fragments on the wrong
//! side of the reference point, stitch connected fragments, and pick a
//! component. When the stitched result is badly fragmented the fragments
//! are chained spatially instead.

use community_polygon_boundary_models::{Axis, CompassDirection};
use community_polygon_geometry::{
    Coord, LineString, Rect, clip, diagonal,
    line::LineExt,
    merge::{ChainAxis, chain_fragments, merge_lines},
};
use strum_macros::{AsRefStr, Display};

use crate::{
    REFERENCE,
    config::MergeConfig,
    fetch::{GeometrySource, RawGeometry},
};

/// How an edge's line was chosen among merged components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MergeSelection {
    /// The fragments merged into a single line.
    Single,
    /// The component nearest the reference point.
    Nearest,
    /// The longest component (nothing was near enough).
    Longest,
    /// Fragments chained along the edge's running axis.
    Chained,
}

/// One coherent line per edge, in the local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEdgeLine {
    pub line: LineString<f64>,
    /// More than one component remained after merging.
    pub fragmented: bool,
    pub selection: MergeSelection,
    pub source: GeometrySource,
}

/// Bounding box of every edge's raw fragments, padded by `padding`.
#[must_use]
pub fn shared_region(raw: &[Option<RawGeometry>], padding: f64) -> Option<Rect<f64>> {
    let bounds: Vec<Rect<f64>> = raw
        .iter()
        .flatten()
        .flat_map(|r| r.fragments.iter())
        .filter_map(LineExt::bounds)
        .collect();
    let first = bounds.first()?;
    let (min, max) = bounds.iter().fold((first.min(), first.max()), |(min, max), b| {
        (
            Coord {
                x: min.x.min(b.min().x),
                y: min.y.min(b.min().y),
            },
            Coord {
                x: max.x.max(b.max().x),
                y: max.y.max(b.max().y),
            },
        )
    });
    let pad = Coord {
        x: padding,
        y: padding,
    };
    Some(Rect::new(min - pad, max + pad))
}

fn inside(rect: &Rect<f64>, line: &LineString<f64>) -> bool {
    line.bounds().is_some_and(|b| {
        b.min().x >= rect.min().x
            && b.min().y >= rect.min().y
            && b.max().x <= rect.max().x
            && b.max().y <= rect.max().y
    })
}

/// Clips fragments that cross `region`; fragments wholly inside pass
/// untouched. If nothing survives, the fragments are returned as they
/// were.
fn clip_to_region(fragments: &[LineString<f64>], region: &Rect<f64>) -> Vec<LineString<f64>> {
    let (kept, crossing): (Vec<LineString<f64>>, Vec<LineString<f64>>) = fragments
        .iter()
        .cloned()
        .partition(|l| inside(region, l));
    let mut clipped = kept;
    clipped.extend(clip::clip_to_rect(&crossing, region));
    if clipped.is_empty() {
        log::debug!("Clipping removed every fragment, keeping them all");
        return fragments.to_vec();
    }
    clipped
}

/// Keeps fragments whose centre lies on the declared side (with
/// `margin`). If that would drop everything, all fragments are kept.
#[must_use]
pub fn filter_by_compass(
    fragments: Vec<LineString<f64>>,
    compass: CompassDirection,
    margin: f64,
) -> Vec<LineString<f64>> {
    let (on_side, off_side): (Vec<_>, Vec<_>) = fragments.into_iter().partition(|l| {
        l.center()
            .is_some_and(|c| compass.admits(c.x - REFERENCE.x, c.y - REFERENCE.y, margin))
    });
    if on_side.is_empty() {
        log::debug!("Compass filter ({compass}) would drop every fragment, keeping them all");
        return off_side;
    }
    if !off_side.is_empty() {
        log::debug!("Compass filter ({compass}) dropped {} fragments", off_side.len());
    }
    on_side
}

fn chain_axis(compass: Option<CompassDirection>, fragments: &[LineString<f64>]) -> ChainAxis {
    match compass.and_then(CompassDirection::running_axis) {
        Some(Axis::EastWest) => ChainAxis::X,
        Some(Axis::NorthSouth) => ChainAxis::Y,
        None => ChainAxis::dominant(fragments),
    }
}

/// Merges and selects one edge's line.
///
/// Returns `None` when no fragment with positive length remains.
#[must_use]
pub fn merge_edge(
    raw: &RawGeometry,
    region: Option<&Rect<f64>>,
    compass: Option<CompassDirection>,
    config: &MergeConfig,
) -> Option<MergedEdgeLine> {
    let mut fragments = match region {
        Some(region) => clip_to_region(&raw.fragments, region),
        None => raw.fragments.clone(),
    };
    if let Some(compass) = compass {
        fragments = filter_by_compass(fragments, compass, config.compass_margin_m);
    }
    fragments.retain(|l| l.length_m() > 0.0);
    if fragments.is_empty() {
        return None;
    }

    let total: f64 = fragments.iter().map(LineExt::length_m).sum();
    let components = merge_lines(&fragments, config.snap_tolerance_m);
    let fragmented = components.len() > 1;

    let longest = components
        .iter()
        .max_by(|a, b| a.length_m().total_cmp(&b.length_m()))?;

    if longest.length_m() < config.fragmented_ratio * total {
        let chained = chain_fragments(&fragments, chain_axis(compass, &fragments))?;
        log::debug!(
            "Longest of {} components holds {:.0}% of {total:.0} m, chaining fragments",
            components.len(),
            100.0 * longest.length_m() / total
        );
        return Some(MergedEdgeLine {
            line: chained,
            fragmented,
            selection: MergeSelection::Chained,
            source: raw.source,
        });
    }

    let (line, selection) = if components.len() == 1 {
        (longest.clone(), MergeSelection::Single)
    } else {
        let reach = region.map_or(f64::INFINITY, |r| diagonal(r) * config.component_reach_ratio);
        let nearest = components
            .iter()
            .min_by(|a, b| a.distance_to(REFERENCE).total_cmp(&b.distance_to(REFERENCE)))?;
        if nearest.distance_to(REFERENCE) <= reach {
            (nearest.clone(), MergeSelection::Nearest)
        } else {
            (longest.clone(), MergeSelection::Longest)
        }
    };

    Some(MergedEdgeLine {
        line,
        fragmented,
        selection,
        source: raw.source,
    })
}
