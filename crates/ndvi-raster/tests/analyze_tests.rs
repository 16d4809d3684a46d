//! Extraction followed by analysis and export.

use std::fs;

use chrono::Utc;
use ndvi_common::{
    AreaOfInterest, CrsCode, NdviError, NdviStatistics, Polygon, RegionDescriptor, TimeRange,
};
use ndvi_raster::{
    extract_artifact, read_statistics, write_statistics, AnalyzerConfig, RasterAnalyzer,
};
use test_utils::{
    areas, assert_approx_eq, create_scaled_ndvi_grid, geotiff_f32, geotiff_i16, require_test_file,
    tar_with_files, temp_test_dir,
};

#[test]
fn test_archive_to_statistics_document() {
    let dir = temp_test_dir();
    let tif = geotiff_i16(2, 2, &[1000, 2000, 3000, -32768], Some("-32768"));
    let archive = dir.path().join("retrieved_files.tar");
    fs::write(&archive, tar_with_files(&[("default.tif", &tif)])).unwrap();

    let artifact = extract_artifact(&archive, &dir.path().join("retrieved_files"), "default.tif").unwrap();
    let summary = RasterAnalyzer::new(AnalyzerConfig::new(-32768.0).with_divisor(10000.0))
        .analyze(&artifact)
        .unwrap();

    assert_eq!(summary.mean, 0.2);
    assert_eq!(summary.min, 0.1);
    assert_eq!(summary.max, 0.3);
    assert_eq!(summary.valid_pixels, 3);

    let area = AreaOfInterest::Polygon(Polygon::new(areas::GORIZIA.to_vec()));
    let time_range = TimeRange::parse("2020-06-20", "2020-06-20").unwrap();
    let stats = NdviStatistics {
        mean: summary.mean,
        min: summary.min,
        max: summary.max,
        valid_pixels: summary.valid_pixels,
        total_pixels: summary.total_pixels,
        region: RegionDescriptor::from_area("Gorizia", CrsCode::Epsg4326, &area).unwrap(),
        time_range,
        computed_at: Utc::now(),
    };

    let out = dir.path().join("ndvi_statistics.json");
    write_statistics(&stats, &out).unwrap();
    let back = read_statistics(&out).unwrap();

    assert_eq!(back.mean, stats.mean);
    assert_eq!(back.min, stats.min);
    assert_eq!(back.max, stats.max);
    assert_eq!(back.region, stats.region);
    assert_eq!(back.time_range, stats.time_range);
}

#[test]
fn test_all_nodata_raster() {
    let dir = temp_test_dir();
    let path = dir.path().join("default.tif");
    fs::write(&path, geotiff_i16(4, 4, &[-32768; 16], Some("-32768"))).unwrap();

    let err = RasterAnalyzer::new(AnalyzerConfig::new(-32768.0))
        .analyze(&path)
        .unwrap_err();

    match err {
        NdviError::NoValidPixels { total_pixels, .. } => assert_eq!(total_pixels, 16),
        other => panic!("expected NoValidPixels, got {:?}", other),
    }
}

#[test]
fn test_configured_sentinel_wins_over_tag() {
    let dir = temp_test_dir();
    let path = dir.path().join("default.tif");
    // File claims -9999 but the producer actually wrote 0 for no-data.
    fs::write(&path, geotiff_f32(4, 1, &[0.0, 0.2, 0.4, -9999.0], Some("-9999"))).unwrap();

    let summary = RasterAnalyzer::new(AnalyzerConfig::new(0.0))
        .analyze(&path)
        .unwrap();

    assert_eq!(summary.valid_pixels, 3);
    assert_eq!(summary.min, -9999.0);
}

#[test]
fn test_ramp_statistics() {
    let dir = temp_test_dir();
    let path = dir.path().join("default.tif");
    let grid = create_scaled_ndvi_grid(11, 3);
    fs::write(&path, geotiff_i16(11, 3, &grid, None)).unwrap();

    let summary = RasterAnalyzer::new(AnalyzerConfig::new(-32768.0).with_divisor(10000.0))
        .analyze(&path)
        .unwrap();

    assert_approx_eq!(summary.min, -0.2, 1e-12);
    assert_approx_eq!(summary.max, 0.8, 1e-12);
    assert_approx_eq!(summary.mean, 0.3, 1e-12);
    assert_eq!(summary.total_pixels, 33);
}

/// Runs against a real processing API response when one is available
/// (set TEST_DATA_DIR or drop it into crates/ndvi-raster/testdata).
#[test]
fn test_real_scene_if_present() {
    let path = require_test_file!("default.tif");

    let summary = RasterAnalyzer::new(AnalyzerConfig::new(-32768.0).with_divisor(10000.0))
        .analyze(&path)
        .unwrap();

    assert!(summary.min >= -1.0 && summary.max <= 1.0);
    assert!(summary.min <= summary.mean && summary.mean <= summary.max);
}
