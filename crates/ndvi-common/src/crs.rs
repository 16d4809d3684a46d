//! Coordinate Reference System codes understood by the processing API.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BoundingBox;

/// Well-known CRS codes accepted for an area of interest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    #[default]
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// WGS84 with explicit lon/lat axis order
    Crs84,
}

impl CrsCode {
    /// Parse a CRS string.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:3857"
    /// - "CRS:84"
    /// - "http://www.opengis.net/def/crs/EPSG/0/4326"
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "HTTP://WWW.OPENGIS.NET/DEF/CRS/EPSG/0/4326" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" | "HTTP://WWW.OPENGIS.NET/DEF/CRS/EPSG/0/3857" => {
                Ok(CrsCode::Epsg3857)
            }
            "CRS:84" | "HTTP://WWW.OPENGIS.NET/DEF/CRS/OGC/1.3/CRS84" => Ok(CrsCode::Crs84),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// The OGC URL form the processing API expects in `bounds.properties.crs`.
    pub fn opengis_url(&self) -> &'static str {
        match self {
            CrsCode::Epsg4326 => "http://www.opengis.net/def/crs/EPSG/0/4326",
            CrsCode::Epsg3857 => "http://www.opengis.net/def/crs/EPSG/0/3857",
            CrsCode::Crs84 => "http://www.opengis.net/def/crs/OGC/1.3/CRS84",
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Crs84)
    }

    /// Get the valid coordinate extent for this CRS.
    pub fn valid_bounds(&self) -> BoundingBox {
        match self {
            CrsCode::Epsg4326 | CrsCode::Crs84 => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            CrsCode::Epsg3857 => {
                // Web Mercator bounds (approx ±85.06° latitude)
                let max_extent = 20037508.342789244;
                BoundingBox::new(-max_extent, -max_extent, max_extent, max_extent)
            }
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
            CrsCode::Crs84 => "CRS:84",
        };
        write!(f, "{}", code)
    }
}

impl TryFrom<String> for CrsCode {
    type Error = CrsParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CrsCode::parse(&value)
    }
}

impl From<CrsCode> for String {
    fn from(code: CrsCode) -> Self {
        code.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(CrsCode::parse("EPSG:4326").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::parse("epsg:3857").unwrap(), CrsCode::Epsg3857);
        assert_eq!(CrsCode::parse("CRS:84").unwrap(), CrsCode::Crs84);
        assert_eq!(
            CrsCode::parse("http://www.opengis.net/def/crs/EPSG/0/4326").unwrap(),
            CrsCode::Epsg4326
        );
        assert!(CrsCode::parse("EPSG:99999").is_err());
    }

    #[test]
    fn test_opengis_url_round_trips() {
        for code in [CrsCode::Epsg4326, CrsCode::Epsg3857, CrsCode::Crs84] {
            assert_eq!(CrsCode::parse(code.opengis_url()).unwrap(), code);
        }
    }

    #[test]
    fn test_serde_uses_short_code() {
        let json = serde_json::to_string(&CrsCode::Epsg4326).unwrap();
        assert_eq!(json, "\"EPSG:4326\"");
        let back: CrsCode = serde_json::from_str("\"crs:84\"").unwrap();
        assert_eq!(back, CrsCode::Crs84);
    }
}
