//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic or projected bounding box.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS (EPSG:3857), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse a comma separated string: "minx,miny,maxx,maxy"
    pub fn from_csv(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let parse = |part: &str| {
            part.parse::<f64>()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))
        };

        Ok(Self {
            min_x: parse(parts[0])?,
            min_y: parse(parts[1])?,
            max_x: parse(parts[2])?,
            max_y: parse(parts[3])?,
        })
    }

    /// Smallest box containing every given `[x, y]` position.
    ///
    /// Returns `None` for an empty slice.
    pub fn envelope(positions: &[[f64; 2]]) -> Option<Self> {
        let (first, rest) = positions.split_first()?;
        let mut bbox = Self::new(first[0], first[1], first[0], first[1]);
        for [x, y] in rest {
            bbox.min_x = bbox.min_x.min(*x);
            bbox.min_y = bbox.min_y.min(*y);
            bbox.max_x = bbox.max_x.max(*x);
            bbox.max_y = bbox.max_y.max(*y);
        }
        Some(bbox)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when all corners are finite and min < max on both axes.
    pub fn is_well_formed(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if this bbox lies entirely inside another.
    pub fn is_within(&self, outer: &BoundingBox) -> bool {
        outer.contains_point(self.min_x, self.min_y) && outer.contains_point(self.max_x, self.max_y)
    }

    /// Corner coordinates in provider order: `[minx, miny, maxx, maxy]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_bbox() {
        let bbox = BoundingBox::from_csv("13.37, 45.84, 13.57, 46.0").unwrap();
        assert_eq!(bbox.min_x, 13.37);
        assert_eq!(bbox.min_y, 45.84);
        assert_eq!(bbox.max_x, 13.57);
        assert_eq!(bbox.max_y, 46.0);
    }

    #[test]
    fn test_envelope() {
        let bbox = BoundingBox::envelope(&[[1.0, 5.0], [-2.0, 3.0], [4.0, 9.0]]).unwrap();
        assert_eq!(bbox, BoundingBox::new(-2.0, 3.0, 4.0, 9.0));
        assert!(BoundingBox::envelope(&[]).is_none());
    }

    #[test]
    fn test_degenerate_box_is_not_well_formed() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_well_formed());
        assert!(!BoundingBox::new(1.0, 0.0, 1.0, 1.0).is_well_formed());
        assert!(!BoundingBox::new(0.0, f64::NAN, 1.0, 1.0).is_well_formed());
    }
}
