//! Statistics document on disk.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndvi_common::{NdviError, NdviResult, NdviStatistics};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

/// Failure reading a statistics document back.
#[derive(Debug, Error)]
pub enum StatisticsReadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid statistics document {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Write `stats` as pretty JSON.
///
/// The document goes to a temporary sibling first and is renamed over `path`,
/// so readers never observe a half-written file.
pub fn write_statistics(stats: &NdviStatistics, path: &Path) -> NdviResult<()> {
    let export_error = |message: String| NdviError::ExportWriteError {
        path: path.to_path_buf(),
        message,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| export_error(e.to_string()))?;

    let tmp = NamedTempFile::new_in(&parent).map_err(|e| export_error(e.to_string()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, stats).map_err(|e| export_error(e.to_string()))?;
        writer.write_all(b"\n").map_err(|e| export_error(e.to_string()))?;
        writer.flush().map_err(|e| export_error(e.to_string()))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| export_error(e.to_string()))?;
    tmp.persist(path).map_err(|e| export_error(e.error.to_string()))?;

    info!(path = %path.display(), mean = stats.mean, "Statistics written");
    Ok(())
}

/// Read a document produced by [`write_statistics`].
pub fn read_statistics(path: &Path) -> Result<NdviStatistics, StatisticsReadError> {
    let text = fs::read_to_string(path).map_err(|source| StatisticsReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| StatisticsReadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
