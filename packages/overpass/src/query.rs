//! Overpass QL query builders.

use geo::Rect;
use strum_macros::{AsRefStr, Display};

/// Server-side timeout requested in every query, in seconds.
pub const QUERY_TIMEOUT_SECS: u32 = 60;

/// OSM key identifying the kind of way to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum WayKind {
    /// `highway=*` ways.
    Highway,
    /// `waterway=*` ways.
    Waterway,
}

/// Escapes regex metacharacters, then escapes the result for a QL string
/// literal.
#[must_use]
pub fn escape_regex(value: &str) -> String {
    escape_string(&regex::escape(value))
}

/// Escapes a value for a double-quoted QL string literal.
#[must_use]
pub fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Overpass bounding box: `south,west,north,east`.
#[must_use]
pub fn bbox(rect: &Rect<f64>) -> String {
    format!(
        "{},{},{},{}",
        rect.min().y,
        rect.min().x,
        rect.max().y,
        rect.max().x
    )
}

/// Ways of `kind` whose name contains `name` (case-insensitive) inside
/// `rect`.
#[must_use]
pub fn ways_by_name(name: &str, kind: WayKind, rect: &Rect<f64>) -> String {
    format!(
        "[out:json][timeout:{QUERY_TIMEOUT_SECS}];\n(\n  way[\"name\"~\"{}\",i][\"{kind}\"]({});\n);\nout geom;",
        escape_regex(name),
        bbox(rect)
    )
}

/// Every named way of `kind` inside `rect`.
#[must_use]
pub fn named_ways_in(kind: WayKind, rect: &Rect<f64>) -> String {
    format!(
        "[out:json][timeout:{QUERY_TIMEOUT_SECS}];\n(\n  way[\"{kind}\"][\"name\"]({});\n);\nout geom;",
        bbox(rect)
    )
}
