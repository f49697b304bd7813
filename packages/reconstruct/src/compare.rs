//! Polygon agreement between the line-based and zoning-based outlines.

use community_polygon_geometry::{
    Polygon,
    polygon::{area, overlap},
};
use serde::Serialize;

/// Areas (square meters) and intersection-over-union of two outlines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub lines_area_m2: f64,
    pub zoning_area_m2: f64,
    pub intersection_area_m2: f64,
    pub union_area_m2: f64,
    /// 1.0 means identical, 0.0 disjoint.
    pub iou: f64,
}

/// Compares two local-frame polygons.
#[must_use]
pub fn compare(lines: &Polygon<f64>, zoning: &Polygon<f64>) -> Comparison {
    let (intersection, union) = overlap(lines, zoning);
    let iou = if union > 0.0 { intersection / union } else { 0.0 };
    let comparison = Comparison {
        lines_area_m2: area(lines),
        zoning_area_m2: area(zoning),
        intersection_area_m2: intersection,
        union_area_m2: union,
        iou,
    };
    log::info!(
        "Lines {:.0} m2 vs zoning {:.0} m2, IoU {:.3}",
        comparison.lines_area_m2,
        comparison.zoning_area_m2,
        comparison.iou
    );
    comparison
}
