//! Transport-level retry for connectivity failures
//!
//! The policy is fixed by contract: each HTTP attempt has a 30 second
//! timeout, and transient network failures are retried up to 2 times with
//! a constant 1 second delay. This is independent of the higher-level
//! single-shot retries (401 refresh, address-stripped fallback), which
//! key on response content rather than connectivity.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;

use crate::http::error::HttpError;

/// Retry policy for the transport layer
#[derive(Debug, Clone)]
pub struct TransportRetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
    /// Per-attempt request timeout
    pub timeout: Duration,
}

impl Default for TransportRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportRetryPolicy {
    /// Constant-interval backoff: multiplier 1.0 and no randomization
    /// turn the exponential schedule into a fixed delay.
    pub fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.delay,
            max_interval: self.delay,
            multiplier: 1.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Execute a request with connectivity retries.
///
/// Only errors whose classification is retryable (network) are replayed;
/// everything else surfaces immediately so status-keyed handling upstream
/// sees the first occurrence.
pub async fn execute_with_retry<F, Fut, T>(
    mut request_fn: F,
    policy: &TransportRetryPolicy,
) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, HttpError>>,
{
    let mut backoff = policy.create_backoff();
    let mut attempts: u32 = 0;

    loop {
        match request_fn().await {
            Ok(response) => return Ok(response),
            Err(error) => {
                if !error.should_retry() || attempts >= policy.max_retries {
                    if attempts > 0 {
                        log::error!(
                            "Request failed after {} retries, not retrying: {}",
                            attempts,
                            error
                        );
                    }
                    return Err(error);
                }
                attempts += 1;
                let delay = backoff.next_backoff().unwrap_or(policy.delay);
                log::warn!(
                    "Transient network failure (attempt {}), retrying after {:?}: {}",
                    attempts,
                    delay,
                    error
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
