//! Caller-side retry for transient network failures.

use std::future::Future;
use std::time::Duration;

use ndvi_common::{NdviError, NdviResult, Stage};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exponential backoff applied only to transient errors.
///
/// `max_retries == 0` (the default) means a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry (doubles each retry)
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out.
    ///
    /// Cancellation during a backoff sleep aborts with `Cancelled { before: stage }`.
    pub async fn run<T, F, Fut>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> NdviResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NdviResult<T>>,
    {
        let mut retry = 0u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);

                    warn!(
                        stage = %stage,
                        error = %e,
                        retry = retry,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(NdviError::Cancelled { before: stage }),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
