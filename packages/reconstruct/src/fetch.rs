//! Geometry fetching.
//!
//! Each edge's raw line fragments come from the first strategy in its
//! list that finds any:
//!
//! * streets: primary exact-name query, then the secondary source's
//!   largest same-named group;
//! * waterways: primary query when it is dense enough, then the secondary
//!   source, then whatever sparse primary geometry there was.

use std::collections::BTreeMap;

use community_polygon_arcgis::NameFilter;
use community_polygon_boundary_models::FeatureType;
use community_polygon_geometry::{LineString, Rect, frame::LocalFrame, line::LineExt};
use strum_macros::{AsRefStr, Display};

use crate::{
    REFERENCE, ReconstructError,
    config::FetchConfig,
    resolve::ResolvedEdge,
    sources::{PrimarySource, SecondarySource, SourceLine},
};

/// Which source produced an edge's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum GeometrySource {
    Primary,
    Secondary,
}

/// Disconnected line fragments for one edge, in the local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGeometry {
    pub fragments: Vec<LineString<f64>>,
    pub source: GeometrySource,
}

impl RawGeometry {
    /// Combined length of all fragments.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.fragments.iter().map(LineExt::length_m).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Primary exact-name query.
    Primary,
    /// Primary query, passing only geometry at least as long as the
    /// sparseness threshold.
    PrimaryDense,
    /// Secondary name-contains query.
    Secondary,
    /// Sparse geometry kept from an earlier [`Strategy::PrimaryDense`].
    SparsePrimary,
}

const STREET_STRATEGIES: &[Strategy] = &[Strategy::Primary, Strategy::Secondary];
const WATERWAY_STRATEGIES: &[Strategy] = &[
    Strategy::PrimaryDense,
    Strategy::Secondary,
    Strategy::SparsePrimary,
];

enum Attempt {
    Found(RawGeometry),
    Next(String),
}

/// Fetches raw geometry for resolved edges.
pub struct Fetcher<'a> {
    primary: &'a dyn PrimarySource,
    secondary: Option<&'a dyn SecondarySource>,
    frame: &'a LocalFrame,
    config: &'a FetchConfig,
}

impl<'a> Fetcher<'a> {
    #[must_use]
    pub const fn new(
        primary: &'a dyn PrimarySource,
        secondary: Option<&'a dyn SecondarySource>,
        frame: &'a LocalFrame,
        config: &'a FetchConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            frame,
            config,
        }
    }

    fn envelope(&self, feature: FeatureType) -> Rect<f64> {
        let radius = match feature {
            FeatureType::Street => self.config.street_radius_m,
            FeatureType::Waterway => self.config.waterway_radius_m,
        };
        self.frame.envelope(REFERENCE, radius)
    }

    /// Fetches one edge's fragments.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructError::NoGeometryFound`] when the primary
    /// source has nothing and there is no secondary source, or
    /// [`ReconstructError::AllSourcesExhausted`] when both came up empty.
    pub async fn fetch(&self, edge: &ResolvedEdge) -> Result<RawGeometry, ReconstructError> {
        let strategies = match edge.feature_type() {
            FeatureType::Street => STREET_STRATEGIES,
            FeatureType::Waterway => WATERWAY_STRATEGIES,
        };
        let envelope = self.envelope(edge.feature_type());

        let mut sparse: Option<RawGeometry> = None;
        let mut primary_outcome = "not tried".to_string();
        let mut secondary_outcome: Option<String> = None;

        for &strategy in strategies {
            let attempt = match strategy {
                Strategy::Primary => self.primary_lines(edge, &envelope).await,
                Strategy::PrimaryDense => match self.primary_lines(edge, &envelope).await {
                    Attempt::Found(raw) if raw.total_length() < self.config.sparse_waterway_m => {
                        let reason = format!(
                            "only {:.0} m of geometry ({} fragments)",
                            raw.total_length(),
                            raw.fragments.len()
                        );
                        sparse = Some(raw);
                        Attempt::Next(reason)
                    }
                    other => other,
                },
                Strategy::Secondary => {
                    let Some(secondary) = self.secondary else {
                        continue;
                    };
                    self.secondary_lines(secondary, edge, &envelope).await
                }
                Strategy::SparsePrimary => match sparse.take() {
                    Some(raw) => Attempt::Found(raw),
                    None => Attempt::Next("no sparse geometry".to_string()),
                },
            };

            match attempt {
                Attempt::Found(raw) => {
                    if let (Strategy::Secondary, Some(kept)) = (strategy, &sparse) {
                        log::info!(
                            "{}: secondary has {:.0} m vs {:.0} m from primary, using secondary",
                            edge.name(),
                            raw.total_length(),
                            kept.total_length()
                        );
                    }
                    log::info!(
                        "{}: {} fragments, {:.0} m from {} source",
                        edge.name(),
                        raw.fragments.len(),
                        raw.total_length(),
                        raw.source
                    );
                    return Ok(raw);
                }
                Attempt::Next(reason) => {
                    log::debug!("{}: {strategy:?} found nothing ({reason})", edge.name());
                    match strategy {
                        Strategy::Primary | Strategy::PrimaryDense => primary_outcome = reason,
                        Strategy::Secondary => secondary_outcome = Some(reason),
                        Strategy::SparsePrimary => {}
                    }
                }
            }
        }

        match secondary_outcome {
            Some(secondary) => Err(ReconstructError::AllSourcesExhausted {
                edge: edge.name().to_string(),
                primary: primary_outcome,
                secondary,
            }),
            None => Err(ReconstructError::NoGeometryFound {
                edge: edge.name().to_string(),
                reason: primary_outcome,
            }),
        }
    }

    async fn primary_lines(&self, edge: &ResolvedEdge, envelope: &Rect<f64>) -> Attempt {
        let Some(name) = edge.canonical_name.as_deref() else {
            return Attempt::Next("no canonical name".to_string());
        };
        match self
            .primary
            .lines(edge.feature_type(), &NameFilter::Exact(name.to_string()), envelope)
            .await
        {
            Ok(lines) if lines.is_empty() => Attempt::Next(format!("no segments named {name:?}")),
            Ok(lines) => Attempt::Found(RawGeometry {
                fragments: lines
                    .iter()
                    .map(|l| self.frame.line_to_local(&l.line))
                    .collect(),
                source: GeometrySource::Primary,
            }),
            Err(e) => Attempt::Next(e.to_string()),
        }
    }

    /// Secondary name-contains query on the user-facing name. Streets keep
    /// only the longest same-named group.
    async fn secondary_lines(
        &self,
        secondary: &dyn SecondarySource,
        edge: &ResolvedEdge,
        envelope: &Rect<f64>,
    ) -> Attempt {
        let lines = match secondary
            .lines_by_name(edge.name(), edge.feature_type(), envelope)
            .await
        {
            Ok(lines) => lines,
            Err(e) => return Attempt::Next(e.to_string()),
        };
        if lines.is_empty() {
            return Attempt::Next(format!("no ways matching {:?}", edge.name()));
        }

        let lines = match edge.feature_type() {
            FeatureType::Street => largest_group(lines),
            FeatureType::Waterway => lines,
        };
        Attempt::Found(RawGeometry {
            fragments: lines
                .iter()
                .map(|l| self.frame.line_to_local(&l.line))
                .collect(),
            source: GeometrySource::Secondary,
        })
    }
}

/// The same-named group with the greatest total length.
fn largest_group(lines: Vec<SourceLine>) -> Vec<SourceLine> {
    let mut groups: BTreeMap<String, Vec<SourceLine>> = BTreeMap::new();
    for line in lines {
        let key = line.name.clone().unwrap_or_default();
        groups.entry(key).or_default().push(line);
    }
    let total = |group: &[SourceLine]| group.iter().map(|l| l.line.length_m()).sum::<f64>();
    groups
        .into_values()
        .max_by(|a, b| total(a).total_cmp(&total(b)))
        .unwrap_or_default()
}
