//! Retry policy applied around individual engine requests.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::EngineError;

/// How often, and how patiently, a failed engine request is repeated.
///
/// Only [retryable](EngineError::is_retryable) failures are repeated; a
/// `NotReady` or `BusyRejected` goes straight back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub retries: u32,
    /// Pause before the first retry.
    pub delay_ms: u64,
    /// Multiplier applied to the pause after every retry (1.0 = fixed delay).
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay_ms: 250,
            backoff: 1.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay_ms: 0,
            backoff: 1.0,
        }
    }

    /// Pause before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(retry as i32);
        Duration::from_millis((self.delay_ms as f64 * factor).round() as u64)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// retries are used up. The last error is returned.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retry < self.retries => {
                    let delay = self.delay_for(retry);
                    warn!(
                        label,
                        attempt = retry + 1,
                        retries = self.retries,
                        error = %err,
                        "engine request failed, retrying in {:?}",
                        delay
                    );
                    retry += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
