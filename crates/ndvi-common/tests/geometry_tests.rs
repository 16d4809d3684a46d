//! Tests for area-of-interest validation across CRS codes.

use ndvi_common::bbox::{BboxParseError, BoundingBox};
use ndvi_common::{AreaOfInterest, CrsCode, Polygon};

// ============================================================================
// BoundingBox parsing
// ============================================================================

#[test]
fn test_parse_bbox_negative() {
    let bbox = BoundingBox::from_csv("-180,-90,180,90").unwrap();
    assert_eq!(bbox.min_x, -180.0);
    assert_eq!(bbox.min_y, -90.0);
    assert_eq!(bbox.max_x, 180.0);
    assert_eq!(bbox.max_y, 90.0);
}

#[test]
fn test_parse_bbox_invalid_format_too_few() {
    let result = BoundingBox::from_csv("0,0,100");
    assert!(matches!(result, Err(BboxParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_bbox_invalid_number() {
    let result = BoundingBox::from_csv("0,0,abc,100");
    assert!(matches!(result, Err(BboxParseError::InvalidNumber(ref n)) if n == "abc"));
}

// ============================================================================
// Area validation
// ============================================================================

fn gorizia_polygon() -> Polygon {
    Polygon::new(vec![
        [13.431473, 45.843278],
        [13.407070, 45.901024],
        [13.374575, 45.944087],
        [13.401089, 45.984709],
        [13.480989, 46.000895],
        [13.524993, 45.966807],
        [13.572922, 45.916585],
        [13.499877, 45.885294],
        [13.431473, 45.843278],
    ])
}

#[test]
fn test_real_region_polygon_is_valid() {
    let aoi = AreaOfInterest::Polygon(gorizia_polygon());
    assert!(aoi.validate(CrsCode::Epsg4326).is_ok());
    assert!(aoi.validate(CrsCode::Crs84).is_ok());
}

#[test]
fn test_triangle_without_closing_point_is_rejected() {
    let aoi = AreaOfInterest::Polygon(Polygon::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]));
    let err = aoi.validate(CrsCode::Epsg4326).unwrap_err();
    assert!(err.contains("at least 4"));
}

#[test]
fn test_nan_position_is_rejected() {
    let mut polygon = gorizia_polygon();
    polygon.exterior[3] = [f64::NAN, 45.9];
    let err = AreaOfInterest::Polygon(polygon)
        .validate(CrsCode::Epsg4326)
        .unwrap_err();
    assert!(err.contains("position 3"));
}

#[test]
fn test_inverted_bbox_is_rejected() {
    let aoi = AreaOfInterest::Bbox(BoundingBox::new(14.0, 45.0, 13.0, 46.0));
    assert!(aoi.validate(CrsCode::Epsg4326).is_err());
}

#[test]
fn test_longitude_past_antimeridian_is_rejected() {
    let aoi = AreaOfInterest::Bbox(BoundingBox::new(179.0, 0.0, 181.0, 1.0));
    assert!(aoi.validate(CrsCode::Epsg4326).is_err());
}
