//! Common types and utilities shared across the NDVI pipeline crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod stats;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{NdviError, NdviResult, Stage};
pub use geometry::{AreaOfInterest, Polygon};
pub use stats::{NdviStatistics, RegionDescriptor};
pub use time::TimeRange;
