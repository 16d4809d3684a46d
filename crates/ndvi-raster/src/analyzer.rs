//! Pixel reduction.

use std::path::Path;

use ndvi_common::{NdviError, NdviResult};
use tracing::{info, warn};

use crate::dataset::RasterDataset;

/// How raw cell values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    /// Cells equal to this value carry no measurement. NaN matches NaN cells.
    pub nodata: f64,
    /// Valid values are divided by this before reporting. Must be positive.
    pub value_divisor: f64,
}

impl AnalyzerConfig {
    pub fn new(nodata: f64) -> Self {
        Self {
            nodata,
            value_divisor: 1.0,
        }
    }

    pub fn with_divisor(mut self, value_divisor: f64) -> Self {
        self.value_divisor = value_divisor;
        self
    }

    fn is_nodata(&self, value: f64) -> bool {
        if self.nodata.is_nan() {
            value.is_nan()
        } else {
            value == self.nodata
        }
    }
}

/// Statistics over the valid cells of one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub valid_pixels: usize,
    pub total_pixels: usize,
}

/// Reduce `values` to mean/min/max, skipping no-data and non-finite cells.
///
/// Returns `None` when no cell is valid.
pub fn summarize(values: &[f64], config: &AnalyzerConfig) -> Option<PixelSummary> {
    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut valid = 0usize;

    for &v in values {
        if config.is_nodata(v) || !v.is_finite() {
            continue;
        }
        sum += v;
        min = min.min(v);
        max = max.max(v);
        valid += 1;
    }

    if valid == 0 {
        return None;
    }

    // Scaling after the reduction keeps integer-coded rasters exact.
    let d = config.value_divisor;
    Some(PixelSummary {
        mean: sum / valid as f64 / d,
        min: min / d,
        max: max / d,
        valid_pixels: valid,
        total_pixels: values.len(),
    })
}

/// Opens rasters and summarizes their first band.
#[derive(Debug, Clone)]
pub struct RasterAnalyzer {
    config: AnalyzerConfig,
}

impl RasterAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, path: &Path) -> NdviResult<PixelSummary> {
        let dataset = RasterDataset::open(path)?;

        if let Some(tag) = dataset.nodata_tag() {
            let agrees = (tag.is_nan() && self.config.nodata.is_nan()) || tag == self.config.nodata;
            if !agrees {
                warn!(
                    path = %path.display(),
                    file_nodata = tag,
                    configured_nodata = self.config.nodata,
                    "Raster declares a different no-data value, using configured value"
                );
            }
        }

        let summary = summarize(dataset.values(), &self.config).ok_or_else(|| {
            NdviError::NoValidPixels {
                path: path.to_path_buf(),
                total_pixels: dataset.pixel_count(),
            }
        })?;

        info!(
            path = %path.display(),
            mean = summary.mean,
            min = summary.min,
            max = summary.max,
            valid_pixels = summary.valid_pixels,
            total_pixels = summary.total_pixels,
            "Raster analyzed"
        );

        Ok(summary)
    }
}
