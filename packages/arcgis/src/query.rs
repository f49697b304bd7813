//! Query parameter builders.

use geo::{Coord, Rect};

/// How to match the name attribute of a line layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    /// Exact, case-sensitive match.
    Exact(String),
    /// Case-insensitive substring match.
    Like(String),
    /// Any feature with a non-empty name.
    Any,
}

/// Quotes a string literal for a SQL-92 where clause.
#[must_use]
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escapes `LIKE` wildcards (and the escape character itself) with `\`.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl NameFilter {
    /// Where clause selecting features by `field`.
    #[must_use]
    pub fn where_clause(&self, field: &str) -> String {
        match self {
            Self::Exact(name) => format!("{field} = {}", quote(name)),
            Self::Like(fragment) => {
                let upper = fragment.to_uppercase();
                let pattern = escape_like(&upper);
                let clause = format!("UPPER({field}) LIKE {}", quote(&format!("%{pattern}%")));
                if pattern.len() == upper.len() {
                    clause
                } else {
                    format!("{clause} ESCAPE '\\'")
                }
            }
            Self::Any => format!("{field} IS NOT NULL AND {field} <> ''"),
        }
    }
}

/// Where clause for zoning parcels carrying an exception number,
/// optionally restricted to a zone category.
#[must_use]
pub fn zoning_where(
    exception_field: &str,
    exception_number: u32,
    zone_field: &str,
    zone_type: Option<&str>,
) -> String {
    let mut clause = format!("{exception_field} = {exception_number}");
    if let Some(zone) = zone_type {
        clause.push_str(&format!(" AND {zone_field} = {}", quote(zone)));
    }
    clause
}

/// Spatial filter parameters for a WGS84 envelope.
#[must_use]
pub fn envelope_params(envelope: &Rect<f64>) -> Vec<(&'static str, String)> {
    vec![
        (
            "geometry",
            format!(
                "{},{},{},{}",
                envelope.min().x,
                envelope.min().y,
                envelope.max().x,
                envelope.max().y
            ),
        ),
        ("geometryType", "esriGeometryEnvelope".to_string()),
        ("inSR", "4326".to_string()),
        ("spatialRel", "esriSpatialRelIntersects".to_string()),
    ]
}

/// Spatial filter parameters selecting the features containing a WGS84
/// point.
#[must_use]
pub fn point_params(point: Coord<f64>) -> Vec<(&'static str, String)> {
    vec![
        ("geometry", format!("{},{}", point.x, point.y)),
        ("geometryType", "esriGeometryPoint".to_string()),
        ("inSR", "4326".to_string()),
        ("spatialRel", "esriSpatialRelIntersects".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_escapes_quotes() {
        let filter = NameFilter::Exact("O'Connor Dr".to_string());
        assert_eq!(
            filter.where_clause("LINEAR_NAME_FULL"),
            "LINEAR_NAME_FULL = 'O''Connor Dr'"
        );
    }

    #[test]
    fn like_is_case_insensitive_substring() {
        let filter = NameFilter::Like("Mimico".to_string());
        assert_eq!(
            filter.where_clause("WATERLINE_NAME"),
            "UPPER(WATERLINE_NAME) LIKE '%MIMICO%'"
        );
    }

    #[test]
    fn like_escapes_wildcards() {
        let filter = NameFilter::Like("100%_Ln".to_string());
        assert_eq!(
            filter.where_clause("NAME"),
            "UPPER(NAME) LIKE '%100\\%\\_LN%' ESCAPE '\\'"
        );
    }

    #[test]
    fn any_requires_a_name() {
        assert_eq!(
            NameFilter::Any.where_clause("NAME"),
            "NAME IS NOT NULL AND NAME <> ''"
        );
    }

    #[test]
    fn zoning_where_with_zone() {
        assert_eq!(
            zoning_where("ZN_EXCPTN_NO", 42, "ZN_ZONE", Some("RD")),
            "ZN_EXCPTN_NO = 42 AND ZN_ZONE = 'RD'"
        );
        assert_eq!(
            zoning_where("ZN_EXCPTN_NO", 42, "ZN_ZONE", None),
            "ZN_EXCPTN_NO = 42"
        );
    }

    #[test]
    fn envelope_is_xmin_ymin_xmax_ymax() {
        let rect = Rect::new(
            Coord { x: -79.52, y: 43.63 },
            Coord { x: -79.49, y: 43.66 },
        );
        let params = envelope_params(&rect);
        assert_eq!(params[0], ("geometry", "-79.52,43.63,-79.49,43.66".to_string()));
        assert!(params.contains(&("inSR", "4326".to_string())));
    }

    #[test]
    fn point_is_lon_lat() {
        let params = point_params(Coord {
            x: -79.5053,
            y: 43.6455,
        });
        assert_eq!(params[0], ("geometry", "-79.5053,43.6455".to_string()));
        assert_eq!(params[1].1, "esriGeometryPoint");
    }
}
