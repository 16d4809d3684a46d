//! Area-of-interest geometry.

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, CrsCode};

/// A single-ring polygon.
///
/// Positions are `[x, y]` (lon/lat for geographic CRS). The ring must be
/// closed: the first and last positions are identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub exterior: Vec<[f64; 2]>,
}

impl Polygon {
    pub fn new(exterior: Vec<[f64; 2]>) -> Self {
        Self { exterior }
    }

    /// Check ring structure, returning a human readable reason on failure.
    pub fn check_ring(&self) -> Result<(), String> {
        if self.exterior.len() < 4 {
            return Err(format!(
                "polygon ring needs at least 4 positions, got {}",
                self.exterior.len()
            ));
        }
        if let Some(i) = self
            .exterior
            .iter()
            .position(|[x, y]| !x.is_finite() || !y.is_finite())
        {
            return Err(format!("position {} is not finite", i));
        }
        if self.exterior.first() != self.exterior.last() {
            return Err("polygon ring is not closed (first position != last)".to_string());
        }
        Ok(())
    }

    pub fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::envelope(&self.exterior)
    }
}

/// Region the raster is requested for.
///
/// Serialized as a single-key map, `{polygon: [...]}` or `{bbox: {...}}`, in
/// both JSON and YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AreaRepr", into = "AreaRepr")]
pub enum AreaOfInterest {
    Polygon(Polygon),
    Bbox(BoundingBox),
}

/// Map form of [`AreaOfInterest`]. Exactly one key must be present.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AreaRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    polygon: Option<Polygon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bbox: Option<BoundingBox>,
}

impl TryFrom<AreaRepr> for AreaOfInterest {
    type Error = String;

    fn try_from(repr: AreaRepr) -> Result<Self, Self::Error> {
        match (repr.polygon, repr.bbox) {
            (Some(polygon), None) => Ok(AreaOfInterest::Polygon(polygon)),
            (None, Some(bbox)) => Ok(AreaOfInterest::Bbox(bbox)),
            (Some(_), Some(_)) => Err("area takes either `polygon` or `bbox`, not both".to_string()),
            (None, None) => Err("area needs a `polygon` or a `bbox`".to_string()),
        }
    }
}

impl From<AreaOfInterest> for AreaRepr {
    fn from(area: AreaOfInterest) -> Self {
        match area {
            AreaOfInterest::Polygon(polygon) => AreaRepr {
                polygon: Some(polygon),
                bbox: None,
            },
            AreaOfInterest::Bbox(bbox) => AreaRepr {
                polygon: None,
                bbox: Some(bbox),
            },
        }
    }
}

impl AreaOfInterest {
    /// Bounding envelope of the area.
    pub fn envelope(&self) -> Option<BoundingBox> {
        match self {
            AreaOfInterest::Polygon(polygon) => polygon.envelope(),
            AreaOfInterest::Bbox(bbox) => Some(*bbox),
        }
    }

    /// Validate shape and extent against the given CRS.
    pub fn validate(&self, crs: CrsCode) -> Result<(), String> {
        let envelope = match self {
            AreaOfInterest::Polygon(polygon) => {
                polygon.check_ring()?;
                polygon
                    .envelope()
                    .ok_or_else(|| "polygon has no positions".to_string())?
            }
            AreaOfInterest::Bbox(bbox) => {
                if !bbox.is_well_formed() {
                    return Err(format!(
                        "bbox must be finite with min < max, got {:?}",
                        bbox.to_array()
                    ));
                }
                *bbox
            }
        };

        let valid = crs.valid_bounds();
        if !envelope.is_within(&valid) {
            return Err(format!(
                "extent {:?} lies outside the valid bounds of {} {:?}",
                envelope.to_array(),
                crs,
                valid.to_array()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(vec![
            [13.0, 45.0],
            [14.0, 45.0],
            [14.0, 46.0],
            [13.0, 46.0],
            [13.0, 45.0],
        ])
    }

    #[test]
    fn test_closed_ring_is_valid() {
        let aoi = AreaOfInterest::Polygon(square());
        assert!(aoi.validate(CrsCode::Epsg4326).is_ok());
        assert_eq!(aoi.envelope(), Some(BoundingBox::new(13.0, 45.0, 14.0, 46.0)));
    }

    #[test]
    fn test_open_ring_is_rejected() {
        let mut polygon = square();
        polygon.exterior.pop();
        polygon.exterior.push([13.5, 45.5]);
        let err = AreaOfInterest::Polygon(polygon)
            .validate(CrsCode::Epsg4326)
            .unwrap_err();
        assert!(err.contains("not closed"));
    }

    #[test]
    fn test_out_of_range_latitude_is_rejected() {
        let aoi = AreaOfInterest::Bbox(BoundingBox::new(10.0, 80.0, 11.0, 95.0));
        assert!(aoi.validate(CrsCode::Epsg4326).is_err());
        // Same numbers are fine as Web Mercator meters
        assert!(aoi.validate(CrsCode::Epsg3857).is_ok());
    }

    #[test]
    fn test_yaml_shape() {
        let aoi: AreaOfInterest =
            serde_json::from_str(r#"{"bbox": {"min_x": 1.0, "min_y": 2.0, "max_x": 3.0, "max_y": 4.0}}"#)
                .unwrap();
        assert_eq!(aoi, AreaOfInterest::Bbox(BoundingBox::new(1.0, 2.0, 3.0, 4.0)));

        let aoi: AreaOfInterest =
            serde_json::from_str(r#"{"polygon": [[0,0],[1,0],[1,1],[0,0]]}"#).unwrap();
        assert!(matches!(aoi, AreaOfInterest::Polygon(ref p) if p.exterior.len() == 4));
    }

    #[test]
    fn test_yaml_map_form() {
        let aoi: AreaOfInterest = serde_yaml::from_str(
            "polygon:\n  - [13.0, 45.0]\n  - [14.0, 45.0]\n  - [14.0, 46.0]\n  - [13.0, 45.0]\n",
        )
        .unwrap();
        assert!(matches!(aoi, AreaOfInterest::Polygon(ref p) if p.exterior.len() == 4));

        let aoi: AreaOfInterest =
            serde_yaml::from_str("bbox:\n  min_x: 13.0\n  min_y: 45.0\n  max_x: 14.0\n  max_y: 46.0\n")
                .unwrap();
        assert_eq!(aoi, AreaOfInterest::Bbox(BoundingBox::new(13.0, 45.0, 14.0, 46.0)));
    }

    #[test]
    fn test_area_needs_exactly_one_shape() {
        assert!(serde_yaml::from_str::<AreaOfInterest>("{}").is_err());
        assert!(serde_yaml::from_str::<AreaOfInterest>(
            "polygon: [[0, 0], [1, 0], [1, 1], [0, 0]]\nbbox: {min_x: 0, min_y: 0, max_x: 1, max_y: 1}\n"
        )
        .is_err());
        assert!(serde_yaml::from_str::<AreaOfInterest>("circle: 3\n").is_err());
    }

    #[test]
    fn test_serializes_as_single_key_map() {
        let json = serde_json::to_value(AreaOfInterest::Polygon(square())).unwrap();
        assert_eq!(json["polygon"][0], serde_json::json!([13.0, 45.0]));
        assert!(json.get("bbox").is_none());
    }
}
