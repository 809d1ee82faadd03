//! Retry engine
//!
//! Drives a single-attempt closure to completion: at most
//! `1 + max_retries` attempts, retrying on 429, 5xx, and transport
//! failures. Server-supplied `retry_after` overrides the exponential
//! backoff. Delays go through `tokio::time::sleep` so tests can run
//! under a paused clock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::{ApiResponse, TransportError};
use crate::metrics::GatewayMetrics;

const BASE_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 30_000;

/// Why an attempt is being retried; the `retries_total` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    RateLimit,
    ServerError,
    Timeout,
    Network,
}

impl RetryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RetryReason::RateLimit => "rate_limit",
            RetryReason::ServerError => "server_error",
            RetryReason::Timeout => "timeout",
            RetryReason::Network => "network",
        }
    }
}

/// Decide whether one attempt outcome warrants another try.
fn retry_reason(outcome: &Result<ApiResponse, TransportError>) -> Option<RetryReason> {
    match outcome {
        Ok(response) if response.ok => None,
        Ok(response) => match response.error_code {
            Some(429) => Some(RetryReason::RateLimit),
            Some(code) if code >= 500 => Some(RetryReason::ServerError),
            // 4xx other than 429 is final; so is a code-less failure
            // envelope the platform chose to send.
            _ => None,
        },
        Err(TransportError::Timeout(_)) => Some(RetryReason::Timeout),
        Err(_) => Some(RetryReason::Network),
    }
}

/// Backoff before retry `i` (0-based): server-supplied delay when the
/// reply carried one, else `min(1s * 2^i, 30s)`.
fn delay_for(outcome: &Result<ApiResponse, TransportError>, retry_index: u32) -> Duration {
    if let Ok(response) = outcome {
        if let Some(secs) = response.retry_after() {
            return Duration::from_secs(secs);
        }
    }
    let exp = BASE_DELAY_MS.saturating_mul(1u64 << retry_index.min(15));
    Duration::from_millis(exp.min(MAX_DELAY_MS))
}

/// Retry driver around a transport attempt.
pub struct RetryEngine {
    max_retries: u32,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl RetryEngine {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            metrics: None,
        }
    }

    pub fn with_metrics(max_retries: u32, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            max_retries,
            metrics: Some(metrics),
        }
    }

    /// Run `attempt` until success, a non-retriable failure, or the
    /// budget is spent. Transport errors surface as code-less envelopes.
    pub async fn execute<F, Fut>(&self, mut attempt: F) -> ApiResponse
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse, TransportError>>,
    {
        let mut retry_index = 0u32;

        loop {
            let outcome = attempt().await;

            let reason = match retry_reason(&outcome) {
                Some(reason) if retry_index < self.max_retries => reason,
                _ => {
                    return match outcome {
                        Ok(response) => response,
                        Err(e) => e.into_response(),
                    };
                }
            };

            let delay = delay_for(&outcome, retry_index);
            debug!(
                reason = reason.as_str(),
                retry = retry_index + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying"
            );

            if let Some(metrics) = &self.metrics {
                metrics.retries_total.inc_labeled("reason", reason.as_str()).await;
            }

            tokio::time::sleep(delay).await;
            retry_index += 1;
        }
    }
}
