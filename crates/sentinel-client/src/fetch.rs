//! Archive retrieval from the processing API.
//!
//! The response body is streamed to `<target>.partial` and only renamed over
//! the target once the whole body has arrived and its leading bytes look like
//! the container that was asked for. A failed fetch never leaves a file at the
//! target path.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use ndvi_common::{NdviError, NdviResult};
use reqwest::{header, Client, StatusCode};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::auth::Authorizer;
use crate::http::provider_message;
use crate::request::{OutputFormat, ProcessingRequest};

/// Bytes kept from the start of the body for container detection.
const SNIFF_LEN: usize = 512;

/// Container detected from the leading bytes of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// POSIX ustar archive
    Tar,
    /// gzip stream, expected to wrap a tar archive
    GzipTar,
    /// Classic or BigTIFF file
    Tiff,
}

impl ContainerKind {
    /// Identify a container from its first bytes.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        if head.len() >= 2 && head[..2] == [0x1f, 0x8b] {
            return Some(ContainerKind::GzipTar);
        }
        if head.len() >= 4 {
            match &head[..4] {
                b"II*\0" | b"MM\0*" | b"II+\0" | b"MM\0+" => return Some(ContainerKind::Tiff),
                _ => {}
            }
        }
        if head.len() >= 262 && &head[257..262] == b"ustar" {
            return Some(ContainerKind::Tar);
        }
        None
    }

    fn satisfies(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::TarOfTiff => matches!(self, ContainerKind::Tar | ContainerKind::GzipTar),
            OutputFormat::Tiff => matches!(self, ContainerKind::Tiff),
        }
    }
}

/// A response body stored on disk.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub path: PathBuf,
    pub bytes: u64,
    pub container: ContainerKind,
}

/// Submits processing requests and stores the returned archive.
pub struct ArchiveFetcher {
    client: Client,
    process_url: String,
}

impl ArchiveFetcher {
    pub fn new(client: Client, process_url: impl Into<String>) -> Self {
        Self {
            client,
            process_url: process_url.into(),
        }
    }

    pub fn process_url(&self) -> &str {
        &self.process_url
    }

    /// POST the request and write the response body to `target`.
    ///
    /// An existing file at `target` is replaced only on success.
    #[instrument(skip(self, request, authorizer), fields(process_url = %self.process_url, target_path = %target.display()))]
    pub async fn fetch(
        &self,
        request: &ProcessingRequest,
        authorizer: &dyn Authorizer,
        target: &Path,
    ) -> NdviResult<FetchedArchive> {
        let format = request.output_format();

        let builder = self
            .client
            .post(&self.process_url)
            .header(header::ACCEPT, format.accept_header())
            .json(request.payload());
        let builder = authorizer.authorize(builder)?;

        let response = builder
            .send()
            .await
            .map_err(|e| NdviError::NetworkUnavailable(format!("processing request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(status = status.as_u16(), error = %e, "Could not read error response body");
                    String::new()
                }
            };
            let message = provider_message(&body, status.canonical_reason().unwrap_or("error"));
            warn!(status = status.as_u16(), message = %message, "Processing request failed");

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NdviError::AuthenticationRejected {
                    status: Some(status.as_u16()),
                    message,
                },
                _ => NdviError::UpstreamProcessingError {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let expected_len = response.content_length();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(content_length = ?expected_len, content_type = ?content_type, "Receiving response body");

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| write_error(parent, e))?;
        }

        let partial = PartialFile::new(target);
        let mut file = File::create(partial.path())
            .await
            .map_err(|e| write_error(partial.path(), e))?;

        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                NdviError::NetworkUnavailable(format!("error reading response body: {}", e))
            })?;

            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }

            file.write_all(&chunk)
                .await
                .map_err(|e| write_error(partial.path(), e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| write_error(partial.path(), e))?;
        file.sync_all().await.map_err(|e| write_error(partial.path(), e))?;
        drop(file);

        if let Some(expected) = expected_len {
            if written != expected {
                return Err(NdviError::NetworkUnavailable(format!(
                    "response truncated: expected {} bytes, got {}",
                    expected, written
                )));
            }
        }

        let container = match ContainerKind::sniff(&head) {
            Some(kind) if kind.satisfies(format) => kind,
            other => {
                return Err(NdviError::UnexpectedResponseFormat(format!(
                    "expected {} but body {} (content-type {}, {} bytes)",
                    format.accept_header(),
                    match other {
                        Some(kind) => format!("looks like {:?}", kind),
                        None => "has no recognizable container signature".to_string(),
                    },
                    content_type.as_deref().unwrap_or("unknown"),
                    written
                )));
            }
        };

        partial.commit().await?;

        info!(
            path = %target.display(),
            bytes = written,
            container = ?container,
            "Archive retrieved"
        );

        Ok(FetchedArchive {
            path: target.to_path_buf(),
            bytes: written,
            container,
        })
    }
}

fn write_error(path: &Path, e: std::io::Error) -> NdviError {
    NdviError::ArchiveWriteError {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// `<target>.partial`, removed on drop unless committed.
struct PartialFile {
    partial: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(target: &Path) -> Self {
        let mut name = target.as_os_str().to_owned();
        name.push(".partial");
        Self {
            partial: PathBuf::from(name),
            target: target.to_path_buf(),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.partial
    }

    async fn commit(mut self) -> NdviResult<()> {
        fs::rename(&self.partial, &self.target)
            .await
            .map_err(|e| write_error(&self.target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_tar() {
        let mut head = vec![0u8; 512];
        head[..11].copy_from_slice(b"default.tif");
        head[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(ContainerKind::sniff(&head), Some(ContainerKind::Tar));
    }

    #[test]
    fn test_sniff_tiff_and_gzip() {
        assert_eq!(ContainerKind::sniff(b"II*\0\x08\0\0\0"), Some(ContainerKind::Tiff));
        assert_eq!(ContainerKind::sniff(b"MM\0*\0\0\0\x08"), Some(ContainerKind::Tiff));
        assert_eq!(ContainerKind::sniff(&[0x1f, 0x8b, 0x08, 0x00]), Some(ContainerKind::GzipTar));
    }

    #[test]
    fn test_sniff_rejects_html_and_short_bodies() {
        assert_eq!(ContainerKind::sniff(b"<html><body>maintenance</body></html>"), None);
        assert_eq!(ContainerKind::sniff(b""), None);
    }

    #[test]
    fn test_container_must_match_format() {
        assert!(ContainerKind::Tar.satisfies(OutputFormat::TarOfTiff));
        assert!(ContainerKind::GzipTar.satisfies(OutputFormat::TarOfTiff));
        assert!(!ContainerKind::Tiff.satisfies(OutputFormat::TarOfTiff));
        assert!(ContainerKind::Tiff.satisfies(OutputFormat::Tiff));
    }

    #[test]
    fn test_partial_file_removed_unless_committed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("retrieved_files.tar");
        let partial_path;
        {
            let partial = PartialFile::new(&target);
            partial_path = partial.path().to_path_buf();
            std::fs::write(&partial_path, b"half").unwrap();
        }
        assert_eq!(partial_path, dir.path().join("retrieved_files.tar.partial"));
        assert!(!partial_path.exists());
        assert!(!target.exists());
    }
}
