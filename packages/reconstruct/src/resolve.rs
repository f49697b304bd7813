//! Name resolution.
//!
//! Descriptions use colloquial names ("Royal York", "Bloor Street West")
//! while the primary source indexes canonical ones ("Royal York Rd",
//! "Bloor St W"). Each edge is resolved by the first tier that succeeds:
//!
//! 1. **Exact**: normalized/aliased name, exact match in the envelope.
//! 2. **Partial**: case-insensitive match on the first significant word,
//!    accepted when it yields exactly one distinct name.
//! 3. **Compass**: every feature of the edge's type in the envelope,
//!    scored by side, length, orientation and distance.
//! 4. **Intersection**: once tiers 1-3 ran for every edge, geocode the
//!    edge's intersection with a resolved neighbour and look for other
//!    names near it.
//!
//! A failing query only skips its tier. Unresolved edges keep their
//! original name and rely on the secondary source.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

use community_polygon_arcgis::NameFilter;
use community_polygon_boundary_models::{Axis, BoundaryEdge, CompassDirection, FeatureType};
use community_polygon_geocoder::Geocoder;
use community_polygon_geometry::{
    Coord, LineString, Rect, frame::LocalFrame, line::LineExt, merge::ChainAxis,
};
use regex::Regex;
use strum_macros::{AsRefStr, Display};

use crate::{REFERENCE, config::ResolveConfig, sources::PrimarySource, sources::SourceLine};

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.,;:]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Street type words and their canonical abbreviations.
const SUFFIXES: &[(&str, &str)] = &[
    ("road", "Rd"),
    ("street", "St"),
    ("avenue", "Ave"),
    ("boulevard", "Blvd"),
    ("drive", "Dr"),
    ("crescent", "Cres"),
    ("court", "Ct"),
    ("place", "Pl"),
    ("trail", "Tr"),
    ("circle", "Cir"),
    ("gardens", "Gdns"),
    ("terrace", "Terr"),
];

const DIRECTIONS: &[(&str, &str)] = &[
    ("west", "W"),
    ("east", "E"),
    ("north", "N"),
    ("south", "S"),
];

/// Which tier resolved an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionTier {
    Exact,
    Partial,
    Compass,
    Intersection,
    Unresolved,
}

/// An edge bound to its canonical primary-source name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEdge {
    /// The edge as described.
    pub edge: BoundaryEdge,
    /// Canonical name in the primary source, if resolved.
    pub canonical_name: Option<String>,
    /// Tier that produced the canonical name.
    pub tier: ResolutionTier,
}

impl ResolvedEdge {
    /// An edge that no tier resolved.
    #[must_use]
    pub const fn unresolved(edge: BoundaryEdge) -> Self {
        Self {
            edge,
            canonical_name: None,
            tier: ResolutionTier::Unresolved,
        }
    }

    /// The user-facing name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.edge.feature_name
    }

    /// The canonical name if resolved, else the user-facing name.
    #[must_use]
    pub fn query_name(&self) -> &str {
        self.canonical_name
            .as_deref()
            .unwrap_or(&self.edge.feature_name)
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.canonical_name.is_some()
    }

    #[must_use]
    pub const fn feature_type(&self) -> FeatureType {
        self.edge.feature_type
    }
}

fn clean(name: &str) -> String {
    let stripped = PUNCTUATION.replace_all(name, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

fn capitalize(word: &str) -> String {
    let has_upper = word.chars().any(char::is_uppercase);
    let has_lower = word.chars().any(char::is_lowercase);
    if has_upper && has_lower {
        return word.to_string();
    }
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

fn abbreviate(word: &str, table: &[(&'static str, &'static str)]) -> Option<&'static str> {
    let lower = word.to_lowercase();
    table
        .iter()
        .find(|(full, abbr)| lower == *full || lower == abbr.to_lowercase())
        .map(|(_, abbr)| *abbr)
}

/// Normalizes user-facing names to the primary source's conventions.
#[derive(Debug, Clone, Default)]
pub struct NameNormalizer {
    aliases: BTreeMap<String, String>,
}

impl NameNormalizer {
    /// Creates a normalizer over an alias table (colloquial to canonical).
    #[must_use]
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        Self {
            aliases: aliases
                .iter()
                .map(|(from, to)| (clean(from).to_lowercase(), to.clone()))
                .collect(),
        }
    }

    fn alias(&self, cleaned: &str) -> Option<&str> {
        self.aliases
            .get(&cleaned.to_lowercase())
            .map(String::as_str)
    }

    /// Street name in canonical form: aliases applied, suffix and trailing
    /// direction abbreviated ("Bloor Street West" -> "Bloor St W").
    ///
    /// Matching is case- and punctuation-insensitive. The first word is
    /// never abbreviated, so "Avenue Road" becomes "Avenue Rd".
    #[must_use]
    pub fn street(&self, name: &str) -> String {
        let cleaned = clean(name);
        if let Some(alias) = self.alias(&cleaned) {
            return alias.to_string();
        }
        let words: Vec<&str> = cleaned.split(' ').collect();
        let last = words.len().saturating_sub(1);
        let normalized = words
            .iter()
            .enumerate()
            .map(|(idx, word)| {
                let abbr = match idx {
                    0 => None,
                    i if i == last => {
                        abbreviate(word, DIRECTIONS).or_else(|| abbreviate(word, SUFFIXES))
                    }
                    _ => abbreviate(word, SUFFIXES),
                };
                abbr.map_or_else(|| capitalize(word), ToString::to_string)
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.alias(&normalized)
            .map_or(normalized, ToString::to_string)
    }

    /// Waterway name: trimmed and aliased only.
    #[must_use]
    pub fn waterway(&self, name: &str) -> String {
        let trimmed = WHITESPACE.replace_all(name.trim(), " ").into_owned();
        self.alias(&clean(&trimmed))
            .map_or(trimmed, ToString::to_string)
    }

    /// Canonical form for either feature type.
    #[must_use]
    pub fn normalize(&self, feature: FeatureType, name: &str) -> String {
        match feature {
            FeatureType::Street => self.street(name),
            FeatureType::Waterway => self.waterway(name),
        }
    }
}

/// First word worth a partial match: skips articles and short words.
fn first_significant_word(name: &str) -> Option<String> {
    clean(name)
        .split(' ')
        .find(|w| w.chars().count() >= 3 && !w.eq_ignore_ascii_case("the"))
        .map(ToString::to_string)
}

/// Resolves every edge of a description against the primary source.
pub struct Resolver<'a> {
    primary: &'a dyn PrimarySource,
    geocoder: &'a dyn Geocoder,
    frame: &'a LocalFrame,
    config: &'a ResolveConfig,
    locality: &'a str,
    normalizer: NameNormalizer,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(
        primary: &'a dyn PrimarySource,
        geocoder: &'a dyn Geocoder,
        frame: &'a LocalFrame,
        config: &'a ResolveConfig,
        locality: &'a str,
    ) -> Self {
        Self {
            primary,
            geocoder,
            frame,
            config,
            locality,
            normalizer: NameNormalizer::new(&config.aliases),
        }
    }

    /// Resolves all edges, in order, preserving their original names.
    pub async fn resolve_all(&self, edges: &[BoundaryEdge]) -> Vec<ResolvedEdge> {
        let envelope = self.frame.envelope(REFERENCE, self.config.search_radius_m);

        let mut resolved = Vec::with_capacity(edges.len());
        for edge in edges {
            resolved.push(self.resolve_direct(edge, &envelope).await);
        }

        for idx in 0..resolved.len() {
            if resolved[idx].is_resolved() {
                continue;
            }
            if let Some(name) = self.resolve_via_intersection(&resolved, idx).await {
                resolved[idx].canonical_name = Some(name);
                resolved[idx].tier = ResolutionTier::Intersection;
            }
        }

        for r in &resolved {
            match &r.canonical_name {
                Some(canonical) => {
                    log::info!("Resolved {} -> {canonical} ({})", r.name(), r.tier);
                }
                None => log::warn!("Could not resolve {} in the primary source", r.name()),
            }
        }
        if !resolved.iter().any(ResolvedEdge::is_resolved) {
            log::warn!("No edge resolved via the primary source; relying on the secondary source");
        }

        resolved
    }

    /// Tiers 1-3 for one edge.
    async fn resolve_direct(&self, edge: &BoundaryEdge, envelope: &Rect<f64>) -> ResolvedEdge {
        let feature = edge.feature_type;
        let resolved = |name: String, tier| ResolvedEdge {
            edge: edge.clone(),
            canonical_name: Some(name),
            tier,
        };

        let normalized = self.normalizer.normalize(feature, &edge.feature_name);
        if let Some(lines) = self
            .query(feature, &NameFilter::Exact(normalized.clone()), envelope)
            .await
            && !lines.is_empty()
        {
            return resolved(normalized, ResolutionTier::Exact);
        }
        log::debug!("No exact match for {normalized:?}");

        if let Some(word) = first_significant_word(&edge.feature_name)
            && let Some(lines) = self
                .query(feature, &NameFilter::Like(word.clone()), envelope)
                .await
        {
            let names: BTreeSet<String> = lines.into_iter().filter_map(|l| l.name).collect();
            if names.len() == 1
                && let Some(name) = names.into_iter().next()
            {
                return resolved(name, ResolutionTier::Partial);
            }
            log::debug!("Partial match on {word:?} is ambiguous or empty");
        }

        if let Some(compass) = edge.compass_direction
            && let Some(lines) = self.query(feature, &NameFilter::Any, envelope).await
        {
            let candidates = self.group_by_name(lines, None);
            if let Some(name) = self.best_by_compass(&candidates, compass) {
                return resolved(name, ResolutionTier::Compass);
            }
        }

        ResolvedEdge::unresolved(edge.clone())
    }

    /// Tier 4: names near the geocoded intersection with a resolved
    /// neighbour.
    async fn resolve_via_intersection(
        &self,
        resolved: &[ResolvedEdge],
        idx: usize,
    ) -> Option<String> {
        let n = resolved.len();
        let edge = &resolved[idx].edge;
        let mut neighbours = vec![(idx + n - 1) % n, (idx + 1) % n];
        neighbours.dedup();

        let mut candidates: BTreeMap<String, Vec<LineString<f64>>> = BTreeMap::new();
        for neighbour in neighbours.into_iter().filter(|&nb| nb != idx) {
            let neighbour = &resolved[neighbour];
            let Some(canonical) = neighbour.canonical_name.as_deref() else {
                continue;
            };
            let mut names = vec![neighbour.name()];
            if canonical != neighbour.name() {
                names.push(canonical);
            }

            for other in names {
                let query = format!("{} & {other}, {}", edge.feature_name, self.locality);
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
                    let envelope = self.frame.envelope(point, self.config.intersection_radius_m);
                    let Some(lines) = self
                        .query(edge.feature_type, &NameFilter::Any, &envelope)
                        .await
                    else {
                        continue;
                    };
                    let exclude = [canonical, other];
                    for (name, lines) in self.group_by_name(lines, Some(exclude.as_slice())) {
                        candidates.entry(name).or_default().extend(lines);
                    }
                }
            }
        }

        if candidates.is_empty() {
            return None;
        }
        if let Some(compass) = edge.compass_direction
            && let Some(best) = self.best_by_compass(&candidates, compass)
        {
            return Some(best);
        }
        candidates
            .into_iter()
            .max_by_key(|(_, lines)| lines.len())
            .map(|(name, _)| name)
    }

    /// Runs a primary query, logging and absorbing failures.
    async fn query(
        &self,
        feature: FeatureType,
        filter: &NameFilter,
        envelope: &Rect<f64>,
    ) -> Option<Vec<SourceLine>> {
        match self.primary.lines(feature, filter, envelope).await {
            Ok(lines) => Some(lines),
            Err(e) => {
                log::warn!("Primary {feature} query {filter:?} failed: {e}");
                None
            }
        }
    }

    /// Groups named lines (projected to the local frame) by name.
    fn group_by_name(
        &self,
        lines: Vec<SourceLine>,
        exclude: Option<&[&str]>,
    ) -> BTreeMap<String, Vec<LineString<f64>>> {
        let mut groups: BTreeMap<String, Vec<LineString<f64>>> = BTreeMap::new();
        for line in lines {
            let Some(name) = line.name else {
                continue;
            };
            if exclude.is_some_and(|names| names.contains(&name.as_str())) {
                continue;
            }
            groups
                .entry(name)
                .or_default()
                .push(self.frame.line_to_local(&line.line));
        }
        groups
    }

    /// Highest-scoring candidate on the declared side, if its score is
    /// positive.
    fn best_by_compass(
        &self,
        candidates: &BTreeMap<String, Vec<LineString<f64>>>,
        compass: CompassDirection,
    ) -> Option<String> {
        candidates
            .iter()
            .filter_map(|(name, lines)| {
                let score = compass_score(lines, compass, self.config)?;
                log::debug!("Candidate {name}: score {score:.0}");
                Some((name, score))
            })
            .filter(|(_, score)| *score > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| name.clone())
    }
}

/// Scores a candidate feature for a compass role.
///
/// `None` when the candidate's length-weighted centre is not on the
/// declared side.
fn compass_score(
    lines: &[LineString<f64>],
    compass: CompassDirection,
    config: &ResolveConfig,
) -> Option<f64> {
    let total: f64 = lines.iter().map(LineExt::length_m).sum();
    if total <= 0.0 {
        return None;
    }
    let weighted = lines
        .iter()
        .filter_map(|l| l.center().map(|c| c * l.length_m()))
        .fold(Coord { x: 0.0, y: 0.0 }, |acc, c| acc + c);
    let center = weighted / total;
    if !compass.admits(center.x, center.y, 0.0) {
        return None;
    }

    let mut score = total.min(config.length_bonus_cap_m);
    let axis_matches = matches!(
        (compass.running_axis(), ChainAxis::dominant(lines)),
        (Some(Axis::EastWest), ChainAxis::X) | (Some(Axis::NorthSouth), ChainAxis::Y)
    );
    if axis_matches {
        score += config.orientation_bonus;
    }
    let nearest = lines
        .iter()
        .map(|l| l.distance_to(REFERENCE))
        .fold(f64::INFINITY, f64::min);
    Some(score - nearest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGeocoder, FakePrimary, frame};

    fn normalizer() -> NameNormalizer {
        NameNormalizer::new(&ResolveConfig::default().aliases)
    }

    #[test]
    fn abbreviations_resolve_to_the_same_name() {
        let plain = NameNormalizer::default();
        assert_eq!(plain.street("Bloor Street West"), "Bloor St W");
        assert_eq!(plain.street("bloor st. w."), "Bloor St W");
        assert_eq!(plain.street("Bloor St W"), "Bloor St W");
        assert_eq!(plain.street("Royal York Road"), "Royal York Rd");
        assert_eq!(plain.street("Avenue Road"), "Avenue Rd");
        assert_eq!(plain.street("North Queen Street"), "North Queen St");
    }

    #[test]
    fn aliases_apply_case_insensitively() {
        let n = normalizer();
        assert_eq!(n.street("Royal York"), "Royal York Rd");
        assert_eq!(n.street("kingsway"), "The Kingsway");
        assert_eq!(n.street("Bloor"), "Bloor St W");
    }

    #[test]
    fn waterways_are_not_abbreviated() {
        let n = normalizer();
        assert_eq!(n.waterway("  Mimico   Creek "), "Mimico Creek");
        assert_eq!(n.normalize(FeatureType::Waterway, "Humber River West"), "Humber River West");
    }

    #[test]
    fn significant_word_skips_articles() {
        assert_eq!(first_significant_word("The Kingsway").as_deref(), Some("Kingsway"));
        assert_eq!(first_significant_word("Mimico Creek").as_deref(), Some("Mimico"));
        assert_eq!(first_significant_word("A B"), None);
    }

    async fn resolve(
        primary: &FakePrimary,
        geocoder: &FakeGeocoder,
        edges: &[BoundaryEdge],
    ) -> Vec<ResolvedEdge> {
        let frame = frame();
        let config = ResolveConfig::default();
        Resolver::new(primary, geocoder, &frame, &config, "Toronto, ON")
            .resolve_all(edges)
            .await
    }

    #[tokio::test]
    async fn exact_match_after_normalization() {
        let primary = FakePrimary::default().with_line(
            FeatureType::Street,
            "Bloor St W",
            &[(-800.0, 500.0), (800.0, 500.0)],
        );
        let edges = vec![
            BoundaryEdge::new(FeatureType::Street, "Bloor Street West", None),
            BoundaryEdge::new(FeatureType::Street, "Bloor St. W", None),
        ];
        let resolved = resolve(&primary, &FakeGeocoder::default(), &edges).await;
        for r in &resolved {
            assert_eq!(r.canonical_name.as_deref(), Some("Bloor St W"));
            assert_eq!(r.tier, ResolutionTier::Exact);
        }
        assert_eq!(resolved[0].name(), "Bloor Street West");
    }

    #[tokio::test]
    async fn partial_match_needs_a_single_name() {
        let primary = FakePrimary::default()
            .with_line(FeatureType::Waterway, "Mimico Creek", &[(-900.0, 0.0), (-900.0, 900.0)])
            .with_line(FeatureType::Street, "Prince Edward Dr N", &[(0.0, 0.0), (0.0, 900.0)])
            .with_line(FeatureType::Street, "Prince Edward Dr S", &[(0.0, 0.0), (0.0, -900.0)]);
        let edges = vec![
            BoundaryEdge::new(FeatureType::Waterway, "Mimico Creek West Branch", None),
            BoundaryEdge::new(FeatureType::Street, "Prince Edward", None),
        ];
        let resolved = resolve(&primary, &FakeGeocoder::default(), &edges).await;
        assert_eq!(resolved[0].canonical_name.as_deref(), Some("Mimico Creek"));
        assert_eq!(resolved[0].tier, ResolutionTier::Partial);
        assert_eq!(resolved[1].tier, ResolutionTier::Unresolved);
        assert_eq!(resolved[1].query_name(), "Prince Edward");
    }

    #[tokio::test]
    async fn compass_scoring_picks_the_declared_side() {
        let primary = FakePrimary::default()
            .with_line(FeatureType::Waterway, "Etobicoke Creek", &[(-600.0, 400.0), (600.0, 400.0)])
            .with_line(FeatureType::Waterway, "Humber River", &[(-600.0, -300.0), (600.0, -300.0)]);
        let edges = vec![
            BoundaryEdge::new(FeatureType::Waterway, "Unnamed Brook", Some(CompassDirection::North)),
            BoundaryEdge::new(FeatureType::Street, "Kipling Ave", None),
        ];
        let resolved = resolve(&primary, &FakeGeocoder::default(), &edges).await;
        assert_eq!(resolved[0].canonical_name.as_deref(), Some("Etobicoke Creek"));
        assert_eq!(resolved[0].tier, ResolutionTier::Compass);
    }

    #[tokio::test]
    async fn geocoded_intersection_finds_nearby_name() {
        let primary = FakePrimary::default()
            .with_line(FeatureType::Street, "Royal York Rd", &[(600.0, -800.0), (600.0, 800.0)])
            .with_line(FeatureType::Street, "Old Mill Rd", &[(100.0, 500.0), (1_000.0, 500.0)]);
        let geocoder = FakeGeocoder::default()
            .with_answer("Thompson Lane & Royal York Rd, Toronto, ON", (600.0, 500.0));
        let edges = vec![
            BoundaryEdge::new(FeatureType::Street, "Royal York Rd", None),
            BoundaryEdge::new(FeatureType::Street, "Thompson Lane", None),
        ];
        let resolved = resolve(&primary, &geocoder, &edges).await;
        assert_eq!(resolved[1].canonical_name.as_deref(), Some("Old Mill Rd"));
        assert_eq!(resolved[1].tier, ResolutionTier::Intersection);
    }

    #[test]
    fn compass_gate_rejects_wrong_side() {
        let config = ResolveConfig::default();
        let south = vec![LineString::from(vec![(-500.0, -400.0), (500.0, -400.0)])];
        assert!(compass_score(&south, CompassDirection::North, &config).is_none());
        let score = compass_score(&south, CompassDirection::South, &config).unwrap();
        assert!((score - (1_000.0 + 500.0 - 400.0)).abs() < 1e-6);
    }

    #[test]
    fn orientation_bonus_only_for_the_running_axis() {
        let config = ResolveConfig::default();
        let along = vec![LineString::from(vec![(-400.0, 600.0), (400.0, 600.0)])];
        let across = vec![LineString::from(vec![(0.0, 600.0), (0.0, 1_400.0)])];
        let with_bonus = compass_score(&along, CompassDirection::North, &config).unwrap();
        let without = compass_score(&across, CompassDirection::North, &config).unwrap();
        assert!((with_bonus - without - config.orientation_bonus).abs() < 1e-6);
    }

    #[test]
    fn length_credit_stops_at_the_cap() {
        let config = ResolveConfig::default();
        let long = vec![LineString::from(vec![(-1_500.0, 400.0), (1_500.0, 400.0)])];
        let capped = vec![LineString::from(vec![(-500.0, 400.0), (500.0, 400.0)])];
        let a = compass_score(&long, CompassDirection::North, &config).unwrap();
        let b = compass_score(&capped, CompassDirection::North, &config).unwrap();
        assert!((a - b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn orientation_bonus_outweighs_a_closer_cross_street() {
        // Without the bonus the north-south candidate scores higher
        // (1000 - 500 against 1000 - 600).
        let primary = FakePrimary::default()
            .with_line(FeatureType::Waterway, "Alpha Creek", &[(0.0, 500.0), (0.0, 1_500.0)])
            .with_line(FeatureType::Waterway, "Beta Creek", &[(-500.0, 600.0), (500.0, 600.0)]);
        let edges = vec![
            BoundaryEdge::new(FeatureType::Waterway, "Unnamed Brook", Some(CompassDirection::North)),
            BoundaryEdge::new(FeatureType::Street, "Kipling Ave", None),
        ];
        let resolved = resolve(&primary, &FakeGeocoder::default(), &edges).await;
        assert_eq!(resolved[0].canonical_name.as_deref(), Some("Beta Creek"));
        assert_eq!(resolved[0].tier, ResolutionTier::Compass);
    }

    #[tokio::test]
    async fn capped_length_lets_the_nearer_feature_win() {
        // Uncapped, the 3 km creek would score 3000 + 500 - 700.
        let primary = FakePrimary::default()
            .with_line(FeatureType::Waterway, "Long Creek", &[(-1_500.0, 700.0), (1_500.0, 700.0)])
            .with_line(FeatureType::Waterway, "Near Creek", &[(-500.0, 400.0), (500.0, 400.0)]);
        let edges = vec![
            BoundaryEdge::new(FeatureType::Waterway, "Unnamed Brook", Some(CompassDirection::North)),
            BoundaryEdge::new(FeatureType::Street, "Kipling Ave", None),
        ];
        let resolved = resolve(&primary, &FakeGeocoder::default(), &edges).await;
        assert_eq!(resolved[0].canonical_name.as_deref(), Some("Near Creek"));
        assert_eq!(resolved[0].tier, ResolutionTier::Compass);
    }
}
