//! Published NDVI statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AreaOfInterest, BoundingBox, CrsCode, TimeRange};

/// Describes the region the statistics were computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Human readable region name from configuration
    pub name: String,
    pub crs: CrsCode,
    /// Envelope of the requested area
    pub bbox: BoundingBox,
}

impl RegionDescriptor {
    /// Describe an area of interest by its envelope.
    ///
    /// Returns `None` for an area without positions.
    pub fn from_area(name: impl Into<String>, crs: CrsCode, area: &AreaOfInterest) -> Option<Self> {
        Some(Self {
            name: name.into(),
            crs,
            bbox: area.envelope()?,
        })
    }
}

/// Final artifact of a pipeline run.
///
/// Field order here is the field order of the exported document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdviStatistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub valid_pixels: usize,
    pub total_pixels: usize,
    pub region: RegionDescriptor,
    pub time_range: TimeRange,
    #[serde(rename = "generated_at")]
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Polygon;

    #[test]
    fn test_region_from_polygon_uses_envelope() {
        let area = AreaOfInterest::Polygon(Polygon::new(vec![
            [13.43, 45.84],
            [13.37, 45.94],
            [13.57, 45.91],
            [13.43, 45.84],
        ]));
        let region = RegionDescriptor::from_area("Gorizia", CrsCode::Epsg4326, &area).unwrap();
        assert_eq!(region.bbox, BoundingBox::new(13.37, 45.84, 13.57, 45.94));
    }
}
