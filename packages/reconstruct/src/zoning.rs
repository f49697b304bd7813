//! Zoning-parcel union.
//!
//! Neighbourhoods with a site-specific zoning exception are covered by
//! parcels sharing that exception number. Their union is an independent
//! estimate of the community's footprint.

use community_polygon_boundary_models::ZoningExceptionDescriptor;
use community_polygon_geometry::{
    Coord, Polygon,
    frame::LocalFrame,
    polygon::{largest_part, part_containing, union_all},
};

use crate::{REFERENCE, ReconstructError, sources::PrimarySource};

/// The zoning union, in the local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoningUnion {
    pub polygon: Polygon<f64>,
    /// Parcels returned by the source.
    pub parcel_count: usize,
    /// The kept part contains the reference point.
    pub contains_reference: bool,
}

/// Unions `parcels` and keeps the part containing `reference`, or the
/// largest part if none does.
#[must_use]
pub fn union_parcels(parcels: &[Polygon<f64>], reference: Coord<f64>) -> Option<(Polygon<f64>, bool)> {
    let parts = union_all(parcels);
    if parts.0.len() > 1 {
        log::debug!("Zoning union has {} parts", parts.0.len());
    }
    part_containing(&parts, reference)
        .map(|p| (p, true))
        .or_else(|| largest_part(&parts).map(|p| (p, false)))
}

/// Fetches and unions the parcels named by `descriptor`.
///
/// # Errors
///
/// Returns [`ReconstructError::NoZoningParcels`] if no parcels match, or
/// [`ReconstructError::Source`] if the query fails.
pub async fn zoning_union(
    primary: &dyn PrimarySource,
    frame: &LocalFrame,
    descriptor: &ZoningExceptionDescriptor,
) -> Result<ZoningUnion, ReconstructError> {
    let envelope = frame.envelope(REFERENCE, descriptor.radius_m);
    let parcels = primary
        .zoning_parcels(
            descriptor.exception_number,
            descriptor.zone_type.as_deref(),
            &envelope,
        )
        .await?;
    log::info!(
        "Found {} parcels for exception {}",
        parcels.len(),
        descriptor.exception_number
    );

    let local: Vec<Polygon<f64>> = parcels.iter().map(|p| frame.polygon_to_local(p)).collect();
    let (polygon, contains_reference) = union_parcels(&local, REFERENCE).ok_or(
        ReconstructError::NoZoningParcels {
            exception_number: descriptor.exception_number,
        },
    )?;
    if !contains_reference {
        log::warn!(
            "No part of the exception {} union contains the reference point; using the largest",
            descriptor.exception_number
        );
    }

    Ok(ZoningUnion {
        polygon,
        parcel_count: parcels.len(),
        contains_reference,
    })
}
