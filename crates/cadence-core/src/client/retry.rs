//! Retrying client with exponential backoff for transient platform failures.
//!
//! Only timeouts and 502s are retried. A 429 puts the [`QuotaMonitor`] into
//! cooldown and fails immediately; every other failure also fails immediately.
//! Each attempt is appended to the API-call log.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cadence_types::api_call::{ApiCall, ApiCallRecord};
use cadence_types::error::ApiError;

use crate::quota::QuotaMonitor;
use crate::repository::ApiCallLog;

/// Backoff schedule: `base_delay`, doubling after each retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor)
    }
}

/// Executes platform calls with retry, rate-limit handling and auditing.
pub struct RetryingClient<L> {
    policy: RetryPolicy,
    quota: Arc<QuotaMonitor>,
    log: L,
}

impl<L: ApiCallLog> RetryingClient<L> {
    pub fn new(policy: RetryPolicy, quota: Arc<QuotaMonitor>, log: L) -> Self {
        Self { policy, quota, log }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Run `operation`, retrying transient failures.
    ///
    /// After the retry budget is spent the last error is returned wrapped in
    /// [`ApiError::RetriesExhausted`] with the number of retries made.
    pub async fn execute<T, F, Fut>(&self, call: &ApiCall, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut retries = 0u32;
        let mut backoff = Duration::ZERO;

        loop {
            let attempt = retries + 1;
            let record = ApiCallRecord::for_attempt(call, attempt, backoff.as_millis() as u64);

            let err = match operation().await {
                Ok(value) => {
                    self.audit(record).await;
                    tracing::debug!(
                        endpoint = %call.endpoint,
                        component = %call.component,
                        attempt,
                        "API call succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => err,
            };

            self.audit(record.failed(err.to_string(), err.status_code()))
                .await;

            if let ApiError::RateLimited {
                reset_at_epoch_secs,
            } = &err
            {
                tracing::warn!(
                    endpoint = %call.endpoint,
                    component = %call.component,
                    attempt,
                    "rate limited by platform"
                );
                self.quota.record_rate_limit_response(*reset_at_epoch_secs);
                return Err(err);
            }

            if !err.is_transient() {
                tracing::warn!(
                    endpoint = %call.endpoint,
                    component = %call.component,
                    attempt,
                    error = %err,
                    "API call failed, not retrying"
                );
                return Err(err);
            }

            if retries >= self.policy.max_retries {
                tracing::error!(
                    endpoint = %call.endpoint,
                    component = %call.component,
                    attempt,
                    error = %err,
                    "API call failed, retries exhausted"
                );
                return Err(ApiError::RetriesExhausted {
                    retries,
                    source: Box::new(err),
                });
            }

            backoff = self.policy.delay_for_retry(retries);
            tracing::warn!(
                endpoint = %call.endpoint,
                component = %call.component,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "transient API failure, backing off"
            );
            tokio::time::sleep(backoff).await;
            retries += 1;
        }
    }

    async fn audit(&self, record: ApiCallRecord) {
        if let Err(e) = self.log.record(&record).await {
            tracing::warn!(
                endpoint = %record.endpoint,
                attempt = record.attempt,
                error = %e,
                "failed to write API call log"
            );
        }
    }
}
