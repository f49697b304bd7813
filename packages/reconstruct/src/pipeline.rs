//! The reconstruction driver.

use community_polygon_boundary_models::{BoundaryDescription, ReferencePoint};
use community_polygon_geocoder::{Geocoder, geocode_first};
use community_polygon_geometry::{
    Coord, LineString, Polygon,
    frame::LocalFrame,
    polygon::{area, contains},
};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{
    REFERENCE, ReconstructError,
    check::{BoundaryCheck, side_check, verdict},
    compare::compare,
    config::ReconstructionConfig,
    corner::{Corner, CornerLocator},
    fetch::{Fetcher, RawGeometry},
    merge::{MergedEdgeLine, merge_edge, shared_region},
    output::{CommunityPolygon, CornerReport, EdgeReport, Reconstruction, ZoningReport},
    resolve::{ResolvedEdge, Resolver},
    ring::{RingAssembler, SegmentKind},
    sources::{PrimarySource, SecondarySource},
    zoning::{ZoningUnion, zoning_union},
};

/// Envelope around a checked point when looking for its zoning parcel.
const ZONING_CHECK_RADIUS_M: f64 = 50.0;

/// Which outlines to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Approach {
    /// Trace the named boundary lines only.
    Lines,
    /// Union the zoning parcels only.
    Zoning,
    /// Both, with a comparison.
    #[default]
    Both,
}

impl Approach {
    const fn lines(self) -> bool {
        matches!(self, Self::Lines | Self::Both)
    }

    const fn zoning(self) -> bool {
        matches!(self, Self::Zoning | Self::Both)
    }
}

/// Reconstructs community polygons from boundary descriptions.
pub struct Reconstructor {
    primary: Box<dyn PrimarySource>,
    secondary: Option<Box<dyn SecondarySource>>,
    geocoder: Box<dyn Geocoder>,
    config: ReconstructionConfig,
    approach: Approach,
}

/// Output of the line-tracing stages.
struct Traced {
    boundary: CommunityPolygon,
    edges: Vec<EdgeReport>,
    corners: Vec<CornerReport>,
    polygon_local: Polygon<f64>,
}

impl Reconstructor {
    #[must_use]
    pub fn new(
        primary: Box<dyn PrimarySource>,
        geocoder: Box<dyn Geocoder>,
        config: ReconstructionConfig,
    ) -> Self {
        Self {
            primary,
            secondary: None,
            geocoder,
            config,
            approach: Approach::default(),
        }
    }

    /// Adds a fallback geometry source.
    #[must_use]
    pub fn with_secondary(mut self, secondary: Box<dyn SecondarySource>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    #[must_use]
    pub const fn with_approach(mut self, approach: Approach) -> Self {
        self.approach = approach;
        self
    }

    /// Reconstructs the community described by `description`.
    ///
    /// # Errors
    ///
    /// * [`ReconstructError::Description`] if the description is invalid
    /// * [`ReconstructError::NoReferencePoint`] or
    ///   [`ReconstructError::ReferenceNotFound`] if there is no usable
    ///   reference point
    /// * [`ReconstructError::RingConstructionFailed`] if fewer than two
    ///   edges have geometry or no ring segment could be built
    /// * any zoning error when only the zoning outline was requested
    pub async fn reconstruct(
        &self,
        description: &BoundaryDescription,
    ) -> Result<Reconstruction, ReconstructError> {
        description.validate()?;
        let reference = self.reference_point(description).await?;
        let frame = LocalFrame::new(reference);
        log::info!(
            "Reconstructing {} around ({:.5}, {:.5}) with {} edges",
            description.community_name,
            reference.y,
            reference.x,
            description.boundaries.len()
        );

        let mut record = Reconstruction {
            community_name: description.community_name.clone(),
            reference,
            boundary: None,
            edges: Vec::new(),
            corners: Vec::new(),
            zoning: None,
            comparison: None,
        };

        let mut lines_polygon = None;
        if self.approach.lines() {
            let traced = self.trace(description, &frame).await?;
            record.boundary = Some(traced.boundary);
            record.edges = traced.edges;
            record.corners = traced.corners;
            lines_polygon = Some(traced.polygon_local);
        }

        if self.approach.zoning()
            && let Some(descriptor) = &description.zoning_exception
        {
            match zoning_union(self.primary.as_ref(), &frame, descriptor).await {
                Ok(ZoningUnion {
                    polygon,
                    parcel_count,
                    contains_reference,
                }) => {
                    if let Some(lines) = &lines_polygon {
                        record.comparison = Some(compare(lines, &polygon));
                    }
                    record.zoning = Some(ZoningReport {
                        exception_number: descriptor.exception_number,
                        area_m2: area(&polygon),
                        polygon: frame.polygon_to_wgs84(&polygon),
                        parcel_count,
                        contains_reference,
                    });
                }
                Err(e) if self.approach == Approach::Zoning => return Err(e),
                Err(e) => log::warn!("Zoning cross-check failed: {e}"),
            }
        } else if self.approach == Approach::Zoning {
            log::warn!("{} has no zoning exception to union", description.community_name);
        }

        Ok(record)
    }

    /// Checks whether `point` (WGS84) lies inside the community: on the
    /// described side of every boundary line, and on a parcel carrying
    /// the community's zoning exception if it has one. Without a `point`
    /// the description's reference point is checked.
    ///
    /// Edges that do not resolve or fetch are reported as inconclusive.
    ///
    /// # Errors
    ///
    /// * [`ReconstructError::Description`] if the description is invalid
    /// * [`ReconstructError::NoReferencePoint`] or
    ///   [`ReconstructError::ReferenceNotFound`] if no point is given and
    ///   the description has no usable reference point
    pub async fn check(
        &self,
        description: &BoundaryDescription,
        point: Option<Coord<f64>>,
    ) -> Result<BoundaryCheck, ReconstructError> {
        description.validate()?;
        let point = match point {
            Some(point) => point,
            None => self.reference_point(description).await?,
        };
        let frame = LocalFrame::new(point);
        log::info!(
            "Checking ({:.5}, {:.5}) against {}",
            point.y,
            point.x,
            description.community_name
        );

        let edges = description.ordered_edges();
        let resolved = Resolver::new(
            self.primary.as_ref(),
            self.geocoder.as_ref(),
            &frame,
            &self.config.resolve,
            &description.locality,
        )
        .resolve_all(&edges)
        .await;

        let fetcher = Fetcher::new(
            self.primary.as_ref(),
            self.secondary.as_deref(),
            &frame,
            &self.config.fetch,
        );
        let mut checks = Vec::with_capacity(resolved.len());
        for edge in &resolved {
            let raw = match fetcher.fetch(edge).await {
                Ok(raw) => Some(raw),
                Err(e) => {
                    log::warn!("{e}");
                    None
                }
            };
            let check = side_check(edge, raw.as_ref().map(|r| r.fragments.as_slice()), &frame);
            log::info!("  {:<24} {:<12} {}", check.edge, check.outcome, check.reason);
            checks.push(check);
        }

        let zoning_applies = match &description.zoning_exception {
            Some(descriptor) => {
                let envelope = frame.envelope(REFERENCE, ZONING_CHECK_RADIUS_M);
                match self
                    .primary
                    .zoning_parcels(
                        descriptor.exception_number,
                        descriptor.zone_type.as_deref(),
                        &envelope,
                    )
                    .await
                {
                    Ok(parcels) => Some(
                        parcels
                            .iter()
                            .any(|p| contains(&frame.polygon_to_local(p), REFERENCE)),
                    ),
                    Err(e) => {
                        log::warn!("Zoning check failed: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        let verdict = verdict(&checks, zoning_applies);
        log::info!("{}: {verdict}", description.community_name);
        Ok(BoundaryCheck {
            community_name: description.community_name.clone(),
            latitude: point.y,
            longitude: point.x,
            checks,
            zoning_applies,
            verdict,
        })
    }

    async fn reference_point(
        &self,
        description: &BoundaryDescription,
    ) -> Result<Coord<f64>, ReconstructError> {
        match &description.reference_point {
            Some(ReferencePoint::Coordinates { lat, lon }) => Ok(Coord { x: *lon, y: *lat }),
            Some(ReferencePoint::Address { address }) => {
                let place = geocode_first(self.geocoder.as_ref(), address)
                    .await?
                    .ok_or_else(|| ReconstructError::ReferenceNotFound {
                        address: address.clone(),
                    })?;
                log::info!(
                    "Reference address {address:?} -> ({:.5}, {:.5}) via {}",
                    place.latitude,
                    place.longitude,
                    place.provider
                );
                Ok(Coord {
                    x: place.longitude,
                    y: place.latitude,
                })
            }
            None => Err(ReconstructError::NoReferencePoint),
        }
    }

    /// Resolve, fetch, merge, locate corners and close the ring.
    async fn trace(
        &self,
        description: &BoundaryDescription,
        frame: &LocalFrame,
    ) -> Result<Traced, ReconstructError> {
        let config = &self.config;
        let locality = description.locality.as_str();
        let edges = description.ordered_edges();

        let resolved = Resolver::new(
            self.primary.as_ref(),
            self.geocoder.as_ref(),
            frame,
            &config.resolve,
            locality,
        )
        .resolve_all(&edges)
        .await;

        let fetcher = Fetcher::new(
            self.primary.as_ref(),
            self.secondary.as_deref(),
            frame,
            &config.fetch,
        );
        let mut raw: Vec<Option<RawGeometry>> = Vec::with_capacity(resolved.len());
        let mut errors: Vec<Option<String>> = Vec::with_capacity(resolved.len());
        for edge in &resolved {
            match fetcher.fetch(edge).await {
                Ok(geometry) => {
                    raw.push(Some(geometry));
                    errors.push(None);
                }
                Err(e) => {
                    log::warn!("{e}");
                    raw.push(None);
                    errors.push(Some(e.to_string()));
                }
            }
        }

        let region = shared_region(&raw, config.merge.clip_padding_m);
        let merged: Vec<Option<MergedEdgeLine>> = resolved
            .iter()
            .zip(&raw)
            .map(|(edge, raw)| {
                raw.as_ref().and_then(|raw| {
                    merge_edge(raw, region.as_ref(), edge.edge.compass_direction, &config.merge)
                })
            })
            .collect();

        let usable = merged.iter().flatten().count();
        if usable < 2 {
            return Err(ReconstructError::RingConstructionFailed {
                reason: format!("only {usable} of {} edges have geometry", resolved.len()),
            });
        }

        let corners = self.corners(&resolved, &merged, frame, locality).await;
        let points: Vec<Option<Coord<f64>>> =
            corners.iter().map(|c| c.as_ref().map(|c| c.point)).collect();

        let assembler = RingAssembler::new(self.secondary.as_deref(), frame, &config.ring);
        let segments = assembler.segments(&resolved, &merged, &points).await;
        let ring = assembler.close(&segments)?;

        let contains_reference = contains(&ring.polygon, REFERENCE);
        let area_m2 = area(&ring.polygon);
        if contains_reference {
            log::info!("Community polygon: {area_m2:.0} m2, contains the reference point");
        } else {
            log::warn!("Community polygon ({area_m2:.0} m2) does not contain the reference point");
        }

        let edges = resolved
            .iter()
            .enumerate()
            .map(|(idx, edge)| {
                let merged = merged[idx].as_ref();
                let segment = segments.iter().find(|s| s.edge_index == idx);
                edge_report(
                    edge,
                    merged,
                    segment.map(|s| (s.kind, &s.line)),
                    errors[idx].clone(),
                    frame,
                )
            })
            .collect();

        let n = resolved.len();
        let corner_reports = corners
            .iter()
            .enumerate()
            .map(|(idx, corner)| CornerReport {
                first: resolved[idx].name().to_string(),
                second: resolved[(idx + 1) % n].name().to_string(),
                point: corner.map(|c| frame.to_wgs84(c.point)),
                gap_m: corner.map(|c| c.gap_m),
                method: corner.map(|c| c.method),
            })
            .collect();

        Ok(Traced {
            boundary: CommunityPolygon {
                polygon: frame.polygon_to_wgs84(&ring.polygon),
                area_m2,
                contains_reference,
                repaired: ring.repaired,
            },
            edges,
            corners: corner_reports,
            polygon_local: ring.polygon,
        })
    }

    /// Corner `i` joins edge `i` to edge `i + 1`, wrapping around.
    async fn corners(
        &self,
        resolved: &[ResolvedEdge],
        merged: &[Option<MergedEdgeLine>],
        frame: &LocalFrame,
        locality: &str,
    ) -> Vec<Option<Corner>> {
        let locator = CornerLocator::new(self.geocoder.as_ref(), frame, &self.config.corner, locality);
        let n = resolved.len();
        let mut corners = Vec::with_capacity(n);
        for idx in 0..n {
            let next = (idx + 1) % n;
            let (la, lb) = (merged[idx].as_ref(), merged[next].as_ref());
            if la.is_none() || lb.is_none() {
                log::info!(
                    "Corner {} / {}: one edge has no geometry, geocoding only",
                    resolved[idx].name(),
                    resolved[next].name()
                );
            }
            match locator
                .locate(
                    &resolved[idx],
                    &resolved[next],
                    la.map(|m| &m.line),
                    lb.map(|m| &m.line),
                )
                .await
            {
                Ok(corner) => corners.push(Some(corner)),
                Err(e) => {
                    log::warn!("{e}");
                    corners.push(None);
                }
            }
        }
        corners
    }
}

fn edge_report(
    edge: &ResolvedEdge,
    merged: Option<&MergedEdgeLine>,
    segment: Option<(SegmentKind, &LineString<f64>)>,
    error: Option<String>,
    frame: &LocalFrame,
) -> EdgeReport {
    EdgeReport {
        edge: edge.edge.clone(),
        canonical_name: edge.canonical_name.clone(),
        tier: edge.tier,
        source: merged.map(|m| m.source),
        selection: merged.map(|m| m.selection),
        fragmented: merged.is_some_and(|m| m.fragmented),
        merged_line: merged.map(|m| frame.line_to_wgs84(&m.line)),
        segment: segment.map(|(kind, _)| kind),
        segment_line: segment.map(|(_, line)| frame.line_to_wgs84(line)),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckOutcome, Verdict};
    use crate::corner::CornerMethod;
    use crate::testing::{FakeGeocoder, FakePrimary, ORIGIN, frame};
    use community_polygon_boundary_models::{
        BoundaryEdge, CompassDirection, DEFAULT_LOCALITY, FeatureType, ZoningExceptionDescriptor,
    };

    fn description(
        boundaries: Vec<BoundaryEdge>,
        zoning_exception: Option<ZoningExceptionDescriptor>,
    ) -> BoundaryDescription {
        BoundaryDescription {
            community_name: "Thompson Orchard".to_string(),
            description: None,
            locality: DEFAULT_LOCALITY.to_string(),
            boundaries,
            reference_point: Some(ReferencePoint::Coordinates {
                lat: ORIGIN.y,
                lon: ORIGIN.x,
            }),
            zoning_exception,
        }
    }

    fn rectangle_primary() -> FakePrimary {
        FakePrimary::default()
            .with_line(FeatureType::Street, "Bloor St W", &[(-600.0, 500.0), (600.0, 500.0)])
            .with_line(FeatureType::Street, "Royal York Rd", &[(600.0, 500.0), (600.0, -400.0)])
            .with_line(FeatureType::Street, "The Queensway", &[(600.0, -400.0), (-600.0, -400.0)])
            .with_line(FeatureType::Street, "Islington Ave", &[(-600.0, -400.0), (-600.0, 500.0)])
    }

    fn rectangle_edges() -> Vec<BoundaryEdge> {
        vec![
            BoundaryEdge::new(FeatureType::Street, "Bloor St W", Some(CompassDirection::North)),
            BoundaryEdge::new(FeatureType::Street, "Royal York Rd", Some(CompassDirection::East)),
            BoundaryEdge::new(FeatureType::Street, "The Queensway", Some(CompassDirection::South)),
            BoundaryEdge::new(FeatureType::Street, "Islington Ave", Some(CompassDirection::West)),
        ]
    }

    #[tokio::test]
    async fn rectangle_is_reconstructed_exactly() {
        let reconstructor = Reconstructor::new(
            Box::new(rectangle_primary()),
            Box::new(FakeGeocoder::default()),
            ReconstructionConfig::default(),
        )
        .with_approach(Approach::Lines);
        let record = reconstructor
            .reconstruct(&description(rectangle_edges(), None))
            .await
            .unwrap();

        assert_eq!(record.corners.len(), 4);
        for corner in &record.corners {
            assert_eq!(corner.method, Some(CornerMethod::Intersection));
            assert_eq!(corner.gap_m, Some(0.0));
        }

        let boundary = record.boundary.unwrap();
        assert!(boundary.contains_reference);
        assert!(!boundary.repaired);
        assert!((boundary.area_m2 - 1_080_000.0).abs() < 1.0);
        let ring = &boundary.polygon.exterior().0;
        assert_eq!(ring.first(), ring.last());
        assert!(record.zoning.is_none());
    }

    #[tokio::test]
    async fn two_streets_and_a_creek_match_the_zoning_union() {
        let primary = FakePrimary::default()
            .with_line(FeatureType::Street, "Royal York Rd", &[(600.0, -1_200.0), (600.0, 800.0)])
            .with_line(FeatureType::Street, "Bloor St W", &[(-1_200.0, 500.0), (900.0, 500.0)])
            .with_line(
                FeatureType::Waterway,
                "Mimico Creek",
                &[(-1_000.0, 600.0), (900.0, -1_300.0)],
            )
            .with_parcel(
                42,
                &[(600.0, 500.0), (-900.0, 500.0), (600.0, -1_000.0), (600.0, 500.0)],
            )
            .with_parcel(
                42,
                &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0), (0.0, 0.0)],
            )
            .with_parcel(
                42,
                &[
                    (1_200.0, 1_200.0),
                    (1_250.0, 1_200.0),
                    (1_250.0, 1_250.0),
                    (1_200.0, 1_250.0),
                    (1_200.0, 1_200.0),
                ],
            );
        let edges = vec![
            BoundaryEdge::new(FeatureType::Street, "Royal York Road", Some(CompassDirection::East)),
            BoundaryEdge::new(
                FeatureType::Street,
                "Bloor Street West",
                Some(CompassDirection::North),
            ),
            BoundaryEdge::new(
                FeatureType::Waterway,
                "Mimico Creek",
                Some(CompassDirection::SouthWest),
            ),
        ];
        let zoning = ZoningExceptionDescriptor {
            exception_number: 42,
            zone_type: None,
            radius_m: 1_650.0,
        };

        let reconstructor = Reconstructor::new(
            Box::new(primary),
            Box::new(FakeGeocoder::default()),
            ReconstructionConfig::default(),
        );
        let record = reconstructor
            .reconstruct(&description(edges, Some(zoning)))
            .await
            .unwrap();

        let boundary = record.boundary.as_ref().unwrap();
        assert!(boundary.contains_reference);
        let ring = &boundary.polygon.exterior().0;
        assert_eq!(ring.first(), ring.last());

        let zoning = record.zoning.as_ref().unwrap();
        assert_eq!(zoning.parcel_count, 3);
        assert!(zoning.contains_reference);

        let comparison = record.comparison.unwrap();
        assert!(comparison.iou >= 0.8, "IoU {}", comparison.iou);
        assert!(
            record
                .edges
                .iter()
                .all(|e| e.canonical_name.is_some() && e.segment.is_some())
        );
    }

    #[tokio::test]
    async fn edge_without_geometry_is_bridged_by_geocoded_corners() {
        let primary = FakePrimary::default()
            .with_line(FeatureType::Street, "Bloor St W", &[(-600.0, 500.0), (600.0, 500.0)])
            .with_line(FeatureType::Street, "Royal York Rd", &[(600.0, 500.0), (600.0, -400.0)])
            .with_line(FeatureType::Street, "Islington Ave", &[(-600.0, -400.0), (-600.0, 500.0)]);
        let geocoder = FakeGeocoder::default()
            .with_answer("Royal York Rd & The Queensway, Toronto, ON", (600.0, -400.0))
            .with_answer("The Queensway & Islington Ave, Toronto, ON", (-600.0, -400.0));
        let reconstructor = Reconstructor::new(
            Box::new(primary),
            Box::new(geocoder),
            ReconstructionConfig::default(),
        )
        .with_approach(Approach::Lines);
        let record = reconstructor
            .reconstruct(&description(rectangle_edges(), None))
            .await
            .unwrap();

        let methods: Vec<Option<CornerMethod>> = record.corners.iter().map(|c| c.method).collect();
        assert_eq!(
            methods,
            vec![
                Some(CornerMethod::Intersection),
                Some(CornerMethod::GeocodedPartial),
                Some(CornerMethod::GeocodedPartial),
                Some(CornerMethod::Intersection),
            ]
        );

        let queensway = &record.edges[2];
        assert!(queensway.merged_line.is_none());
        assert_eq!(queensway.segment, Some(SegmentKind::Straight));

        let boundary = record.boundary.unwrap();
        assert!(boundary.contains_reference);
        assert!((boundary.area_m2 - 1_080_000.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn too_few_usable_edges_is_fatal() {
        let primary = FakePrimary::default().with_line(
            FeatureType::Street,
            "Bloor St W",
            &[(-600.0, 500.0), (600.0, 500.0)],
        );
        let reconstructor = Reconstructor::new(
            Box::new(primary),
            Box::new(FakeGeocoder::default()),
            ReconstructionConfig::default(),
        );
        let edges = rectangle_edges()
            .into_iter()
            .map(|mut edge| {
                edge.compass_direction = None;
                edge
            })
            .collect();
        let err = reconstructor
            .reconstruct(&description(edges, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconstructError::RingConstructionFailed { .. }));
    }

    #[tokio::test]
    async fn reference_address_is_geocoded() {
        let geocoder = FakeGeocoder::default().with_answer("9 Ashton Manor, Etobicoke, ON", (0.0, 0.0));
        let reconstructor = Reconstructor::new(
            Box::new(rectangle_primary()),
            Box::new(geocoder),
            ReconstructionConfig::default(),
        )
        .with_approach(Approach::Lines);
        let mut desc = description(rectangle_edges(), None);
        desc.reference_point = Some(ReferencePoint::Address {
            address: "9 Ashton Manor, Etobicoke, ON".to_string(),
        });
        let record = reconstructor.reconstruct(&desc).await.unwrap();
        assert!((record.reference.x - ORIGIN.x).abs() < 1e-9);
        assert!(record.boundary.unwrap().contains_reference);

        desc.reference_point = Some(ReferencePoint::Address {
            address: "Nowhere".to_string(),
        });
        let err = reconstructor.reconstruct(&desc).await.unwrap_err();
        assert!(matches!(err, ReconstructError::ReferenceNotFound { .. }));

        desc.reference_point = None;
        let err = reconstructor.reconstruct(&desc).await.unwrap_err();
        assert!(matches!(err, ReconstructError::NoReferencePoint));
    }

    #[tokio::test]
    async fn zoning_only_requires_parcels() {
        let reconstructor = Reconstructor::new(
            Box::new(rectangle_primary()),
            Box::new(FakeGeocoder::default()),
            ReconstructionConfig::default(),
        )
        .with_approach(Approach::Zoning);
        let zoning = ZoningExceptionDescriptor {
            exception_number: 9,
            zone_type: None,
            radius_m: 1_650.0,
        };
        let err = reconstructor
            .reconstruct(&description(rectangle_edges(), Some(zoning)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconstructError::NoZoningParcels { exception_number: 9 }));
    }

    #[test]
    fn approach_parses() {
        assert_eq!("both".parse::<Approach>().unwrap(), Approach::Both);
        assert_eq!("Zoning".parse::<Approach>().unwrap(), Approach::Zoning);
        assert_eq!(Approach::Lines.to_string(), "lines");
    }

    #[tokio::test]
    async fn reference_inside_the_rectangle_checks_inside() {
        let reconstructor = Reconstructor::new(
            Box::new(rectangle_primary()),
            Box::new(FakeGeocoder::default()),
            ReconstructionConfig::default(),
        );
        let result = reconstructor
            .check(&description(rectangle_edges(), None), None)
            .await
            .unwrap();

        assert_eq!(result.checks.len(), 4);
        assert!(result.checks.iter().all(|c| c.outcome == CheckOutcome::Pass));
        assert_eq!(result.zoning_applies, None);
        assert_eq!(result.verdict, Verdict::Inside);
        assert!((result.latitude - ORIGIN.y).abs() < 1e-12);
    }

    #[tokio::test]
    async fn point_across_a_street_on_an_exception_parcel_is_a_discrepancy() {
        let primary = rectangle_primary().with_parcel(
            42,
            &[(700.0, -100.0), (900.0, -100.0), (900.0, 100.0), (700.0, 100.0), (700.0, -100.0)],
        );
        let reconstructor = Reconstructor::new(
            Box::new(primary),
            Box::new(FakeGeocoder::default()),
            ReconstructionConfig::default(),
        );
        let zoning = ZoningExceptionDescriptor {
            exception_number: 42,
            zone_type: None,
            radius_m: 1_650.0,
        };
        let point = frame().to_wgs84(Coord { x: 800.0, y: 0.0 });
        let result = reconstructor
            .check(&description(rectangle_edges(), Some(zoning)), Some(point))
            .await
            .unwrap();

        let royal_york = &result.checks[1];
        assert_eq!(royal_york.edge, "Royal York Rd");
        assert_eq!(royal_york.outcome, CheckOutcome::Fail);
        assert!((royal_york.offset_east_m.unwrap() + 200.0).abs() < 0.5);
        assert_eq!(result.checks[0].outcome, CheckOutcome::Pass);
        assert_eq!(result.zoning_applies, Some(true));
        assert_eq!(result.verdict, Verdict::BoundaryDiscrepancy);

        let no_parcel = Reconstructor::new(
            Box::new(rectangle_primary()),
            Box::new(FakeGeocoder::default()),
            ReconstructionConfig::default(),
        );
        let zoning = ZoningExceptionDescriptor {
            exception_number: 42,
            zone_type: None,
            radius_m: 1_650.0,
        };
        let result = no_parcel
            .check(&description(rectangle_edges(), Some(zoning)), Some(point))
            .await
            .unwrap();
        assert_eq!(result.zoning_applies, Some(false));
        assert_eq!(result.verdict, Verdict::Outside);
    }
}
