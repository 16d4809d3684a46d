//! Local half of the NDVI pipeline.
//!
//! - [`archive`]: unpacks the processing API's tar response, rejecting
//!   entries that would escape the extraction directory
//! - [`dataset`]: reads the first band of a GeoTIFF
//! - [`analyzer`]: reduces valid pixels to mean/min/max
//! - [`export`]: writes and reads the statistics document
//!
//! # Example
//!
//! ```ignore
//! use ndvi_raster::{extract_artifact, AnalyzerConfig, RasterAnalyzer};
//!
//! let tif = extract_artifact("retrieved_files.tar".as_ref(), "retrieved_files".as_ref(), "default.tif")?;
//! let summary = RasterAnalyzer::new(AnalyzerConfig::new(-32768.0).with_divisor(10000.0)).analyze(&tif)?;
//! ```

pub mod analyzer;
pub mod archive;
pub mod dataset;
pub mod export;

pub use analyzer::{summarize, AnalyzerConfig, PixelSummary, RasterAnalyzer};
pub use archive::{
    extract_artifact, ArchiveExtractor, ArtifactLocated, Extracted, Unopened, Validated,
};
pub use dataset::RasterDataset;
pub use export::{read_statistics, write_statistics, StatisticsReadError};
