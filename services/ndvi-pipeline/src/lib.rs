//! NDVI pipeline service.
//!
//! Wires the Sentinel Hub client and the raster crate into a single run:
//! authenticate, request, fetch, extract, analyze, export.

pub mod config;
pub mod pipeline;
pub mod retry;

pub use config::{load_config, parse_config, PipelineConfig};
pub use pipeline::{Pipeline, RunReport};
pub use retry::RetryPolicy;
