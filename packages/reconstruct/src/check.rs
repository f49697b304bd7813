//! Side-of-edge checks.
//!
//! A point belongs to a community when it lies on the described side of
//! every boundary line: a community bounded "east by Royal York" needs
//! Royal York to the east of the point. Each edge's nearest fetched
//! geometry is compared with its compass direction, and the checks are
//! combined with the zoning exception (if any) into a verdict.

use community_polygon_geometry::{Coord, LineString, distance, frame::LocalFrame, line::LineExt};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::{REFERENCE, resolve::ResolvedEdge};

/// Result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Pass,
    Fail,
    Inconclusive,
}

/// Where one boundary line lies relative to the checked point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideCheck {
    pub edge: String,
    pub canonical_name: Option<String>,
    pub outcome: CheckOutcome,
    /// East offset of the nearest point on the line.
    pub offset_east_m: Option<f64>,
    /// North offset of the nearest point on the line.
    pub offset_north_m: Option<f64>,
    pub distance_m: Option<f64>,
    /// Nearest point on the line, `[longitude, latitude]`.
    pub nearest: Option<[f64; 2]>,
    pub reason: String,
}

/// Overall answer for a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// On the right side of every line.
    Inside,
    /// Inside the zoning exception but across a boundary line.
    BoundaryDiscrepancy,
    /// Across at least one boundary line.
    Outside,
    /// Not enough evidence either way.
    Inconclusive,
}

/// Everything known about one point and one community.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryCheck {
    pub community_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub checks: Vec<SideCheck>,
    /// The point lies on a parcel carrying the community's zoning
    /// exception. `None` without an exception or if the query failed.
    pub zoning_applies: Option<bool>,
    pub verdict: Verdict,
}

impl BoundaryCheck {
    /// Serializes the check as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn nearest_point(fragments: &[LineString<f64>]) -> Option<Coord<f64>> {
    fragments
        .iter()
        .filter_map(|fragment| fragment.closest_coord(REFERENCE))
        .min_by(|a, b| distance(*a, REFERENCE).total_cmp(&distance(*b, REFERENCE)))
}

/// Checks that the line fetched for `edge` lies on its described side of
/// the frame's centre. `fragments` are in the local frame.
#[must_use]
pub fn side_check(
    edge: &ResolvedEdge,
    fragments: Option<&[LineString<f64>]>,
    frame: &LocalFrame,
) -> SideCheck {
    let mut check = SideCheck {
        edge: edge.name().to_string(),
        canonical_name: edge.canonical_name.clone(),
        outcome: CheckOutcome::Inconclusive,
        offset_east_m: None,
        offset_north_m: None,
        distance_m: None,
        nearest: None,
        reason: String::new(),
    };

    let Some(nearest) = fragments.and_then(nearest_point) else {
        check.reason = "no geometry".to_string();
        return check;
    };
    let offset = nearest - REFERENCE;
    let wgs84 = frame.to_wgs84(nearest);
    check.offset_east_m = Some(offset.x);
    check.offset_north_m = Some(offset.y);
    check.distance_m = Some(distance(nearest, REFERENCE));
    check.nearest = Some([wgs84.x, wgs84.y]);

    let Some(direction) = edge.edge.compass_direction else {
        check.reason = "no compass direction".to_string();
        return check;
    };
    if direction.admits(offset.x, offset.y, 0.0) {
        check.outcome = CheckOutcome::Pass;
        check.reason = format!("{} lies {direction} of the point", edge.name());
    } else {
        check.outcome = CheckOutcome::Fail;
        check.reason = format!(
            "{} lies at ({:.0} m E, {:.0} m N), not {direction} of the point",
            edge.name(),
            offset.x,
            offset.y
        );
    }
    check
}

/// Combines the side checks and the zoning test.
///
/// A matching zoning exception over a failed check is reported as a
/// discrepancy; a missing one downgrades an all-pass to inconclusive.
#[must_use]
pub fn verdict(checks: &[SideCheck], zoning_applies: Option<bool>) -> Verdict {
    let ran = checks
        .iter()
        .filter(|c| c.outcome != CheckOutcome::Inconclusive)
        .count();
    let failed = checks.iter().any(|c| c.outcome == CheckOutcome::Fail);

    if failed {
        return if zoning_applies == Some(true) {
            Verdict::BoundaryDiscrepancy
        } else {
            Verdict::Outside
        };
    }
    if ran == 0 {
        return Verdict::Inconclusive;
    }
    if zoning_applies == Some(false) {
        Verdict::Inconclusive
    } else {
        Verdict::Inside
    }
}
