//! Corner location between adjacent edges.
//!
//! Strategies run in a fixed order and the first that produces a corner
//! wins:
//!
//! 1. **Geocoded**: geocode the intersection by name and snap the result
//!    onto both lines. This is the only strategy that works when one of
//!    the lines is missing.
//! 2. **Intersection**: the crossing point nearest the reference point.
//! 3. **Extrapolated**: extend each line from its facing end along its
//!    heading and intersect the rays.
//! 4. **Nearest**: midpoint of the closest pair of points, if close enough.

use community_polygon_geocoder::Geocoder;
use community_polygon_geometry::{
    Coord, LineString, distance,
    frame::LocalFrame,
    line::{LineExt, straight},
    midpoint,
    nearest::{
        NearestPair, endpoint_facing, endpoint_snap_pair, intersection_points, nearest_pair,
        nearest_to, ray_end,
    },
};
use strum_macros::{AsRefStr, Display};

use crate::{REFERENCE, ReconstructError, config::CornerConfig, resolve::ResolvedEdge};

/// Strategy that located a corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum CornerMethod {
    /// Geocoded intersection snapped onto both lines.
    GeocodedSnapped,
    /// Geocoded intersection snapped onto one line only.
    GeocodedPartial,
    /// The lines cross.
    Intersection,
    /// The lines' extensions meet.
    Extrapolated,
    /// The lines never meet; closest approach.
    Nearest,
}

/// Where two adjacent edges meet, in the local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub point: Coord<f64>,
    /// Residual distance between the two lines at the corner (0 when they
    /// cross).
    pub gap_m: f64,
    pub method: CornerMethod,
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Geocoded,
    Intersection,
    Extrapolated,
    Nearest,
}

const STRATEGIES: &[Strategy] = &[
    Strategy::Geocoded,
    Strategy::Intersection,
    Strategy::Extrapolated,
    Strategy::Nearest,
];

/// Locates corners between adjacent merged edge lines.
pub struct CornerLocator<'a> {
    geocoder: &'a dyn Geocoder,
    frame: &'a LocalFrame,
    config: &'a CornerConfig,
    locality: &'a str,
}

impl<'a> CornerLocator<'a> {
    #[must_use]
    pub const fn new(
        geocoder: &'a dyn Geocoder,
        frame: &'a LocalFrame,
        config: &'a CornerConfig,
        locality: &'a str,
    ) -> Self {
        Self {
            geocoder,
            frame,
            config,
            locality,
        }
    }

    /// Locates the corner between edge `a` (line `la`) and edge `b`
    /// (line `lb`). An edge without geometry passes `None`; its corners
    /// can then only come from geocoding.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructError::CornerNotFound`] if no strategy
    /// succeeds.
    pub async fn locate(
        &self,
        a: &ResolvedEdge,
        b: &ResolvedEdge,
        la: Option<&LineString<f64>>,
        lb: Option<&LineString<f64>>,
    ) -> Result<Corner, ReconstructError> {
        let not_found = || ReconstructError::CornerNotFound {
            first: a.name().to_string(),
            second: b.name().to_string(),
        };
        if la.is_none() && lb.is_none() {
            return Err(not_found());
        }

        for strategy in STRATEGIES {
            let corner = match (strategy, la, lb) {
                (Strategy::Geocoded, ..) => self.geocoded(a, b, la, lb).await,
                (Strategy::Intersection, Some(la), Some(lb)) => intersection(la, lb),
                (Strategy::Extrapolated, Some(la), Some(lb)) => self.extrapolated(la, lb),
                (Strategy::Nearest, Some(la), Some(lb)) => self.nearest(la, lb),
                _ => continue,
            };
            if let Some(corner) = corner {
                log::info!(
                    "Corner {} / {}: ({:.0}, {:.0}) via {} (gap {:.0} m)",
                    a.name(),
                    b.name(),
                    corner.point.x,
                    corner.point.y,
                    corner.method,
                    corner.gap_m
                );
                return Ok(corner);
            }
            log::debug!("Corner {} / {}: {strategy:?} found nothing", a.name(), b.name());
        }

        Err(not_found())
    }

    fn queries(&self, a: &ResolvedEdge, b: &ResolvedEdge) -> Vec<String> {
        let mut queries = Vec::new();
        for first in edge_names(a) {
            for second in edge_names(b) {
                for joiner in ["&", "at"] {
                    let query = format!("{first} {joiner} {second}, {}", self.locality);
                    if !queries.contains(&query) {
                        queries.push(query);
                    }
                }
            }
        }
        queries
    }

    async fn geocoded(
        &self,
        a: &ResolvedEdge,
        b: &ResolvedEdge,
        la: Option<&LineString<f64>>,
        lb: Option<&LineString<f64>>,
    ) -> Option<Corner> {
        for query in self.queries(a, b) {
            let places = match self.geocoder.geocode(&query).await {
                Ok(places) => places,
                Err(e) => {
                    log::warn!("Geocoding {query:?} failed: {e}");
                    continue;
                }
            };
            for place in places {
                let point = self.frame.to_local(Coord {
                    x: place.longitude,
                    y: place.latitude,
                });
                if let Some(corner) = self.snap_geocoded(point, la, lb) {
                    return Some(corner);
                }
                log::debug!("Geocoded {query:?} lies too far from the lines");
            }
        }
        None
    }

    fn snap_geocoded(
        &self,
        point: Coord<f64>,
        la: Option<&LineString<f64>>,
        lb: Option<&LineString<f64>>,
    ) -> Option<Corner> {
        let on_a = la.and_then(|l| l.closest_coord(point));
        let on_b = lb.and_then(|l| l.closest_coord(point));

        let (near, gap_m) = match (on_a, on_b) {
            (Some(on_a), Some(on_b)) => {
                let (da, db) = (distance(point, on_a), distance(point, on_b));
                if da <= self.config.snap_both_m && db <= self.config.snap_both_m {
                    return Some(Corner {
                        point: midpoint(on_a, on_b),
                        gap_m: distance(on_a, on_b),
                        method: CornerMethod::GeocodedSnapped,
                    });
                }
                (if da <= db { on_a } else { on_b }, da.max(db))
            }
            (Some(on), None) | (None, Some(on)) => (on, distance(point, on)),
            (None, None) => return None,
        };
        (distance(point, near) <= self.config.snap_one_m).then_some(Corner {
            point: near,
            gap_m,
            method: CornerMethod::GeocodedPartial,
        })
    }

    fn extrapolated(&self, la: &LineString<f64>, lb: &LineString<f64>) -> Option<Corner> {
        let ray = |line: &LineString<f64>, other: &LineString<f64>| {
            let at_start = endpoint_facing(line, other)?;
            let (tip, dir) = line.outward_heading(at_start, self.config.heading_window)?;
            Some(straight(tip, ray_end(tip, dir, self.config.extrapolate_m)))
        };
        let ray_a = ray(la, lb)?;
        let ray_b = ray(lb, la)?;

        let mut candidates = intersection_points(&ray_a, &ray_b);
        candidates.extend(intersection_points(&ray_a, lb));
        candidates.extend(intersection_points(la, &ray_b));
        let point = nearest_to(&candidates, REFERENCE)?;

        let (da, db) = (la.distance_to(point), lb.distance_to(point));
        if da > self.config.extrapolate_accept_m || db > self.config.extrapolate_accept_m {
            log::debug!("Extrapolated corner is {da:.0} m / {db:.0} m from the lines");
            return None;
        }
        Some(Corner {
            point,
            gap_m: da.max(db),
            method: CornerMethod::Extrapolated,
        })
    }

    fn nearest(&self, la: &LineString<f64>, lb: &LineString<f64>) -> Option<Corner> {
        let pair = [endpoint_snap_pair(la, lb), nearest_pair(la, lb)]
            .into_iter()
            .flatten()
            .min_by(|x: &NearestPair, y: &NearestPair| x.gap.total_cmp(&y.gap))?;
        if pair.gap > self.config.nearest_max_gap_m {
            log::debug!("Closest approach is {:.0} m, too far for a corner", pair.gap);
            return None;
        }
        Some(Corner {
            point: pair.midpoint(),
            gap_m: pair.gap,
            method: CornerMethod::Nearest,
        })
    }
}

/// The user-facing name, then the canonical name if it differs.
fn edge_names(edge: &ResolvedEdge) -> Vec<&str> {
    let mut names = vec![edge.name()];
    if let Some(canonical) = edge.canonical_name.as_deref()
        && canonical != edge.name()
    {
        names.push(canonical);
    }
    names
}

fn intersection(la: &LineString<f64>, lb: &LineString<f64>) -> Option<Corner> {
    let point = nearest_to(&intersection_points(la, lb), REFERENCE)?;
    Some(Corner {
        point,
        gap_m: 0.0,
        method: CornerMethod::Intersection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolutionTier;
    use crate::testing::{FakeGeocoder, frame, local_line};
    use community_polygon_boundary_models::{BoundaryEdge, FeatureType};

    fn edge(feature: FeatureType, name: &str) -> ResolvedEdge {
        ResolvedEdge {
            edge: BoundaryEdge::new(feature, name, None),
            canonical_name: Some(name.to_string()),
            tier: ResolutionTier::Exact,
        }
    }

    async fn locate(
        geocoder: &FakeGeocoder,
        a: &ResolvedEdge,
        b: &ResolvedEdge,
        la: &[(f64, f64)],
        lb: &[(f64, f64)],
    ) -> Result<Corner, ReconstructError> {
        let frame = frame();
        let config = CornerConfig::default();
        CornerLocator::new(geocoder, &frame, &config, "Toronto, ON")
            .locate(a, b, Some(&local_line(la)), Some(&local_line(lb)))
            .await
    }

    fn close(a: Coord<f64>, x: f64, y: f64) -> bool {
        (a.x - x).abs() < 0.01 && (a.y - y).abs() < 0.01
    }

    #[tokio::test]
    async fn geocoded_corner_snaps_to_both_lines() {
        let geocoder = FakeGeocoder::default()
            .with_answer("Bloor St W & Royal York Rd, Toronto, ON", (120.0, 30.0));
        let corner = locate(
            &geocoder,
            &edge(FeatureType::Street, "Bloor St W"),
            &edge(FeatureType::Street, "Royal York Rd"),
            &[(-500.0, 0.0), (500.0, 0.0)],
            &[(100.0, -500.0), (100.0, 500.0)],
        )
        .await
        .unwrap();
        assert_eq!(corner.method, CornerMethod::GeocodedSnapped);
        assert!(close(corner.point, 110.0, 15.0));
        assert!((corner.gap_m - 1_300.0_f64.sqrt()).abs() < 0.01);
    }

    #[tokio::test]
    async fn geocoded_corner_near_one_line_is_partial() {
        let geocoder = FakeGeocoder::default()
            .with_answer("Bloor St W at Royal York Rd, Toronto, ON", (300.0, 600.0));
        let corner = locate(
            &geocoder,
            &edge(FeatureType::Street, "Bloor St W"),
            &edge(FeatureType::Street, "Royal York Rd"),
            &[(-500.0, 0.0), (500.0, 0.0)],
            &[(300.0, -500.0), (300.0, 700.0)],
        )
        .await
        .unwrap();
        assert_eq!(corner.method, CornerMethod::GeocodedPartial);
        assert!(close(corner.point, 300.0, 600.0));
        assert!((corner.gap_m - 600.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn street_and_waterway_corner_is_geocoded() {
        let geocoder = FakeGeocoder::default()
            .with_answer("Bloor St W & Mimico Creek, Toronto, ON", (120.0, 30.0));
        let corner = locate(
            &geocoder,
            &edge(FeatureType::Street, "Bloor St W"),
            &edge(FeatureType::Waterway, "Mimico Creek"),
            &[(-500.0, 0.0), (500.0, 0.0)],
            &[(100.0, -500.0), (100.0, 500.0)],
        )
        .await
        .unwrap();
        assert_eq!(corner.method, CornerMethod::GeocodedSnapped);
        assert!(close(corner.point, 110.0, 15.0));
    }

    #[tokio::test]
    async fn ungeocoded_crossing_uses_the_intersection() {
        let corner = locate(
            &FakeGeocoder::default(),
            &edge(FeatureType::Waterway, "Mimico Creek"),
            &edge(FeatureType::Street, "Bloor St W"),
            &[(100.0, -500.0), (100.0, 500.0)],
            &[(-500.0, 0.0), (500.0, 0.0)],
        )
        .await
        .unwrap();
        assert_eq!(corner.method, CornerMethod::Intersection);
        assert!(close(corner.point, 100.0, 0.0));
        assert!(corner.gap_m.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn missing_line_snaps_onto_the_other() {
        let frame = frame();
        let config = CornerConfig::default();
        let geocoder = FakeGeocoder::default()
            .with_answer("Royal York Rd & The Queensway, Toronto, ON", (590.0, -400.0));
        let locator = CornerLocator::new(&geocoder, &frame, &config, "Toronto, ON");
        let present = local_line(&[(600.0, 500.0), (600.0, -400.0)]);
        let royal_york = edge(FeatureType::Street, "Royal York Rd");
        let queensway = edge(FeatureType::Street, "The Queensway");

        let corner = locator
            .locate(&royal_york, &queensway, Some(&present), None)
            .await
            .unwrap();
        assert_eq!(corner.method, CornerMethod::GeocodedPartial);
        assert!(close(corner.point, 600.0, -400.0));
        assert!((corner.gap_m - 10.0).abs() < 0.01);

        let err = locator
            .locate(&queensway, &royal_york, None, Some(&present))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconstructError::CornerNotFound { .. }));

        let err = locator
            .locate(&royal_york, &queensway, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconstructError::CornerNotFound { .. }));
    }

    #[tokio::test]
    async fn rays_meet_past_the_line_ends() {
        let corner = locate(
            &FakeGeocoder::default(),
            &edge(FeatureType::Street, "Bloor St W"),
            &edge(FeatureType::Street, "Royal York Rd"),
            &[(-500.0, 0.0), (0.0, 0.0)],
            &[(300.0, 600.0), (300.0, 100.0)],
        )
        .await
        .unwrap();
        assert_eq!(corner.method, CornerMethod::Extrapolated);
        assert!(close(corner.point, 300.0, 0.0));
        assert!((corner.gap_m - 300.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn parallel_lines_fall_back_to_nearest() {
        let corner = locate(
            &FakeGeocoder::default(),
            &edge(FeatureType::Street, "Bloor St W"),
            &edge(FeatureType::Street, "Dundas St W"),
            &[(0.0, 0.0), (500.0, 0.0)],
            &[(0.0, 100.0), (500.0, 100.0)],
        )
        .await
        .unwrap();
        assert_eq!(corner.method, CornerMethod::Nearest);
        assert!((corner.gap_m - 100.0).abs() < 0.01);
        assert!((corner.point.y - 50.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn distant_lines_have_no_corner() {
        let err = locate(
            &FakeGeocoder::default(),
            &edge(FeatureType::Street, "Bloor St W"),
            &edge(FeatureType::Street, "Dundas St W"),
            &[(0.0, 0.0), (500.0, 0.0)],
            &[(0.0, 3_000.0), (500.0, 3_000.0)],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReconstructError::CornerNotFound { .. }));
    }
}
