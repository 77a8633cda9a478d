//! Polling scheduler primitives
//!
//! Every suspension point (retry wait, inter-tick wait, in-flight network
//! call) races against the client's cancellation token.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Wait between attempts of a failed network operation
pub const RETRY_INTERVAL: Duration = Duration::from_secs(30);
/// Registration failures surface immediately
pub const MAX_RETRIES: u32 = 0;
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(60);

/// Options of one `run` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub polling_interval: Duration,
    pub retry_interval: Duration,
    pub max_retries: u32,
    /// Delete the station instead of polling
    pub delete: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            polling_interval: DEFAULT_POLLING_INTERVAL,
            retry_interval: RETRY_INTERVAL,
            max_retries: MAX_RETRIES,
            delete: false,
        }
    }
}

impl RunOptions {
    pub fn polling(polling_interval: Duration) -> Self {
        Self {
            polling_interval,
            ..Self::default()
        }
    }

    pub fn deletion() -> Self {
        Self {
            delete: true,
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: self.retry_interval,
            max_retries: self.max_retries,
        }
    }
}

/// Fixed-interval retry of network operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: RETRY_INTERVAL,
            max_retries: MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Run `op` up to `1 + max_retries` times
    ///
    /// Only retryable errors are retried. Cancellation during a retry wait
    /// returns the last error.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if attempt >= self.max_retries || !e.is_retryable() {
                        return Err(e);
                    }
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        "Operation failed, retrying in {:?}: {}",
                        self.interval,
                        e
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(e),
                        _ = tokio::time::sleep(self.interval) => {}
                    }
                }
            }
        }
    }
}

/// Sleep for `duration` unless cancelled first; returns false on cancellation
pub async fn wait_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Await `fut` unless cancelled first; `None` on cancellation
pub async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        value = fut => Some(value),
    }
}
