//! End-to-end NDVI run.
//!
//! ```text
//! credentials ─► token ─► request ─► fetch ─► extract ─► analyze ─► export
//! ```
//!
//! Stages run strictly in sequence. A cancellation checkpoint precedes each
//! one, and network stages also stop as soon as the token is cancelled.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use ndvi_common::{NdviError, NdviResult, NdviStatistics, RegionDescriptor, Stage};
use ndvi_raster::{write_statistics, ArchiveExtractor, PixelSummary, RasterAnalyzer};
use sentinel_client::{
    build_request, ArchiveFetcher, Credentials, RequestParameters, TokenAcquirer,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub statistics: NdviStatistics,
    pub statistics_path: PathBuf,
    /// Raster the statistics were computed from, if it was kept
    pub artifact_path: Option<PathBuf>,
    /// Downloaded archive, if it was kept
    pub archive_path: Option<PathBuf>,
}

/// One configured pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    params: RequestParameters,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Resolve configuration into request parameters.
    ///
    /// Fails on configuration problems only (unreadable evalscript file,
    /// unknown CRS, unparsable dates).
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let params = config.request_parameters()?;
        Ok(Self {
            config,
            params,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[instrument(skip(self), fields(region = %self.config.request.region_name))]
    pub async fn run(&self) -> NdviResult<RunReport> {
        let output = &self.config.output;
        remove_stale_statistics(&output.statistics_path)?;
        remove_stale_fetch_outputs(&self.stale_fetch_outputs())?;

        let retry = self.config.retry_policy();

        // === Authentication ===
        self.checkpoint(Stage::Authentication)?;
        let credentials = Credentials::new(
            self.config.credentials.client_id.clone(),
            self.config.credentials.client_secret.clone(),
        )?;
        let client = self.config.http_settings().build_client()?;
        let acquirer = TokenAcquirer::new(client.clone(), self.config.endpoints.token_url.clone());
        let token = self
            .guard(
                Stage::Authentication,
                retry.run(Stage::Authentication, &self.cancel, || {
                    acquirer.acquire(&credentials)
                }),
            )
            .await?;

        // === Request ===
        self.checkpoint(Stage::Request)?;
        let request = build_request(&self.params)?;
        let format = request.output_format();
        debug!(
            output_format = ?format,
            artifact = %request.artifact_name(),
            "Processing request built"
        );

        // === Fetch ===
        self.checkpoint(Stage::Fetch)?;
        let fetch_target = if format.is_archive() {
            output.archive_path.clone()
        } else {
            output.extract_dir.join(request.artifact_name())
        };
        let fetcher = ArchiveFetcher::new(client, self.config.endpoints.process_url.clone());
        let fetched = self
            .guard(
                Stage::Fetch,
                retry.run(Stage::Fetch, &self.cancel, || {
                    fetcher.fetch(&request, &token, &fetch_target)
                }),
            )
            .await?;

        // === Extract ===
        self.checkpoint(Stage::Extract)?;
        let (artifact, placed) = if format.is_archive() {
            let archive = fetched.path.clone();
            let target = output.extract_dir.clone();
            let name = request.artifact_name();
            run_blocking(Stage::Extract, &fetched.path, move || {
                let located = ArchiveExtractor::new(archive, target)
                    .validate()?
                    .extract()?
                    .locate(&name)?;
                let placed = located.placed_entries().to_vec();
                Ok((located.into_artifact_path(), placed))
            })
            .await?
        } else {
            debug!(path = %fetched.path.display(), "Single raster response, nothing to extract");
            (fetched.path.clone(), vec![fetched.path.clone()])
        };

        // === Analyze ===
        self.checkpoint(Stage::Analyze)?;
        let analyzer = RasterAnalyzer::new(self.config.analyzer_config());
        let raster = artifact.clone();
        let summary: PixelSummary =
            run_blocking(Stage::Analyze, &artifact, move || analyzer.analyze(&raster)).await?;

        // === Export ===
        self.checkpoint(Stage::Export)?;
        let region = RegionDescriptor::from_area(
            self.config.request.region_name.clone(),
            request.crs(),
            request.area(),
        )
        .ok_or_else(|| NdviError::invalid_param("area_of_interest", "area has no positions"))?;

        let statistics = NdviStatistics {
            mean: summary.mean,
            min: summary.min,
            max: summary.max,
            valid_pixels: summary.valid_pixels,
            total_pixels: summary.total_pixels,
            region,
            time_range: *request.time_range(),
            computed_at: Utc::now(),
        };
        write_statistics(&statistics, &output.statistics_path)?;

        let archive_path = if format.is_archive() {
            if output.keep_archive {
                Some(fetched.path.clone())
            } else {
                remove_quietly(&fetched.path);
                None
            }
        } else {
            None
        };

        let artifact_path = if output.keep_extracted {
            Some(artifact)
        } else {
            for path in &placed {
                remove_quietly(path);
            }
            remove_dir_if_empty(&output.extract_dir);
            None
        };

        info!(
            statistics = %output.statistics_path.display(),
            mean = statistics.mean,
            min = statistics.min,
            max = statistics.max,
            valid_pixels = statistics.valid_pixels,
            "NDVI run complete"
        );

        Ok(RunReport {
            statistics,
            statistics_path: output.statistics_path.clone(),
            artifact_path,
            archive_path,
        })
    }

    /// Files a failed fetch could otherwise leave behind from an earlier run.
    fn stale_fetch_outputs(&self) -> Vec<PathBuf> {
        let output = &self.config.output;
        let mut paths = vec![output.extract_dir.join(self.params.artifact_name())];
        if self.params.output_format.is_archive() {
            paths.push(output.archive_path.clone());
        }
        paths
    }

    fn checkpoint(&self, stage: Stage) -> NdviResult<()> {
        if self.cancel.is_cancelled() {
            warn!(stage = %stage, "Run cancelled");
            return Err(NdviError::Cancelled { before: stage });
        }
        debug!(stage = %stage, "Entering stage");
        Ok(())
    }

    /// Race a stage future against cancellation.
    async fn guard<T>(
        &self,
        stage: Stage,
        fut: impl Future<Output = NdviResult<T>>,
    ) -> NdviResult<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!(stage = %stage, "Run cancelled mid-stage");
                Err(NdviError::Cancelled { before: stage })
            }
            result = fut => result,
        }
    }
}

/// Run file-bound work off the async executor.
async fn run_blocking<T, F>(stage: Stage, path: &Path, work: F) -> NdviResult<T>
where
    F: FnOnce() -> NdviResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => {
            let message = format!("worker task failed: {}", e);
            Err(match stage {
                Stage::Extract => NdviError::ArchiveCorrupt {
                    path: path.to_path_buf(),
                    message,
                },
                _ => NdviError::RasterReadError {
                    path: path.to_path_buf(),
                    message,
                },
            })
        }
    }
}

/// A statistics file from an earlier run must not survive a failed run.
fn remove_stale_statistics(path: &Path) -> NdviResult<()> {
    remove_stale(path).map_err(|e| NdviError::ExportWriteError {
        path: path.to_path_buf(),
        message: format!("cannot remove previous statistics: {}", e),
    })
}

/// Neither may an archive or raster that a failed fetch would not overwrite.
fn remove_stale_fetch_outputs(paths: &[PathBuf]) -> NdviResult<()> {
    for path in paths {
        remove_stale(path).map_err(|e| NdviError::ArchiveWriteError {
            path: path.clone(),
            message: format!("cannot remove output of previous run: {}", e),
        })?;
    }
    Ok(())
}

fn remove_stale(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed output of previous run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn remove_quietly(path: &Path) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => debug!(path = %path.display(), "Removed intermediate output"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove intermediate output"),
    }
}

/// Drop the extraction directory once nothing else lives in it.
fn remove_dir_if_empty(path: &Path) {
    match std::fs::remove_dir(path) {
        Ok(()) => debug!(path = %path.display(), "Removed empty extraction directory"),
        Err(e) => debug!(path = %path.display(), error = %e, "Extraction directory kept"),
    }
}
