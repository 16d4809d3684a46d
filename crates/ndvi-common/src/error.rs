//! Error types for the NDVI pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using NdviError.
pub type NdviResult<T> = Result<T, NdviError>;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Authentication,
    Request,
    Fetch,
    Extract,
    Analyze,
    Export,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Authentication => "authentication",
            Stage::Request => "request",
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Analyze => "analyze",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary error type for pipeline operations.
#[derive(Debug, Error)]
pub enum NdviError {
    // === Authentication ===
    #[error("Identity provider unreachable: {0}")]
    AuthenticationUnavailable(String),

    #[error("Authentication rejected{}: {message}", status_suffix(.status))]
    AuthenticationRejected {
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed token response: {0}")]
    AuthenticationProtocolError(String),

    // === Request construction ===
    #[error("Invalid request parameter '{param}': {message}")]
    InvalidRequestParameters { param: String, message: String },

    // === Fetch ===
    #[error("Processing endpoint unreachable: {0}")]
    NetworkUnavailable(String),

    #[error("Upstream processing failed (HTTP {status}): {message}")]
    UpstreamProcessingError { status: u16, message: String },

    #[error("Unexpected response format: {0}")]
    UnexpectedResponseFormat(String),

    #[error("Failed to store archive at {}: {message}", .path.display())]
    ArchiveWriteError { path: PathBuf, message: String },

    // === Extraction ===
    #[error("Archive {} is corrupt: {message}", .path.display())]
    ArchiveCorrupt { path: PathBuf, message: String },

    #[error("Expected artifact '{artifact}' not found in {}", .archive.display())]
    ExpectedArtifactMissing { artifact: String, archive: PathBuf },

    #[error("Cannot extract into {}: {message}", .target.display())]
    InvalidExtractTarget { target: PathBuf, message: String },

    // === Analysis ===
    #[error("Not a readable raster {}: {message}", .path.display())]
    RasterFormatError { path: PathBuf, message: String },

    #[error("Failed to read raster {}: {message}", .path.display())]
    RasterReadError { path: PathBuf, message: String },

    #[error("No valid pixels in {} ({total_pixels} cells, all no-data)", .path.display())]
    NoValidPixels { path: PathBuf, total_pixels: usize },

    // === Export ===
    #[error("Failed to write statistics to {}: {message}", .path.display())]
    ExportWriteError { path: PathBuf, message: String },

    #[error("Run cancelled before {before} stage")]
    Cancelled { before: Stage },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl NdviError {
    /// Create an InvalidRequestParameters error.
    pub fn invalid_param(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequestParameters {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Stage the error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            NdviError::AuthenticationUnavailable(_)
            | NdviError::AuthenticationProtocolError(_) => Stage::Authentication,

            // A rejected token during fetch is still an authentication failure.
            NdviError::AuthenticationRejected { .. } => Stage::Authentication,

            NdviError::InvalidRequestParameters { .. } => Stage::Request,

            NdviError::NetworkUnavailable(_)
            | NdviError::UpstreamProcessingError { .. }
            | NdviError::UnexpectedResponseFormat(_)
            | NdviError::ArchiveWriteError { .. } => Stage::Fetch,

            NdviError::ArchiveCorrupt { .. }
            | NdviError::ExpectedArtifactMissing { .. }
            | NdviError::InvalidExtractTarget { .. } => Stage::Extract,

            NdviError::RasterFormatError { .. }
            | NdviError::RasterReadError { .. }
            | NdviError::NoValidPixels { .. } => Stage::Analyze,

            NdviError::ExportWriteError { .. } => Stage::Export,

            NdviError::Cancelled { before } => *before,
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    ///
    /// Only transport-level failures qualify; provider rejections and local
    /// data errors are deterministic.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NdviError::AuthenticationUnavailable(_) | NdviError::NetworkUnavailable(_)
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if matches!(self, NdviError::Cancelled { .. }) {
            return 130;
        }
        match self.stage() {
            Stage::Authentication => 3,
            Stage::Request => 4,
            Stage::Fetch => 5,
            Stage::Extract => 6,
            Stage::Analyze => 7,
            Stage::Export => 8,
        }
    }
}
