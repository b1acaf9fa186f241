//! Coordinate reference system identifiers.

use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A coordinate reference system as referenced by a collection or region.
///
/// Only identifies the CRS. Resolving it into an actual projection is the
/// job of a reprojection provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Crs {
    /// An EPSG registry code (e.g. 4326, 3857, 32630).
    Epsg(u32),
    /// Any other definition, kept verbatim.
    Other(String),
    /// No CRS is known for the data.
    #[default]
    Undefined,
}

impl Crs {
    /// WGS 84 geographic coordinates (`EPSG:4326`), the `GeoJSON` default.
    pub const WGS84: Self = Self::Epsg(4326);

    /// Spherical Web Mercator (`EPSG:3857`).
    pub const WEB_MERCATOR: Self = Self::Epsg(3857);

    #[must_use]
    pub const fn epsg(&self) -> Option<u32> {
        match self {
            Self::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined)
    }

    fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("undefined") {
            return Self::Undefined;
        }

        let lower = trimmed.to_ascii_lowercase();
        let rest = lower.strip_prefix("urn:ogc:def:crs:").unwrap_or(&lower);

        // OGC:CRS84 is lon/lat on WGS 84, which is how EPSG:4326 is handled here
        if rest == "crs84" || (rest.starts_with("ogc:") && rest.ends_with(":crs84")) {
            return Self::WGS84;
        }

        if let Some(code) = rest.strip_prefix("epsg:") {
            // "epsg:4326", "epsg::4326" and versioned "epsg:9.8:4326" forms
            if let Ok(code) = code.rsplit(':').next().unwrap_or(code).parse::<u32>() {
                return Self::Epsg(code);
            }
        }

        Self::Other(trimmed.to_string())
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Other(definition) => f.write_str(definition),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

impl FromStr for Crs {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Crs {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for Crs {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}
