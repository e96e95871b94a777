use std::fmt::Display;
use std::future::Future;

use tokio::time::{Duration, sleep};
use tracing::warn;

use crate::observability::metrics::Metrics;
use crate::store::StoreError;
use crate::store::blob::BlobError;

/// Collaborator errors that say whether another attempt may succeed.
pub trait Retryable: Display {
    fn is_transient(&self) -> bool;
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }
}

impl Retryable for BlobError {
    fn is_transient(&self) -> bool {
        matches!(self, BlobError::Unavailable(_))
    }
}

/// Bounded exponential backoff for transient collaborator failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    /// Clamped before converting back, so a long outage never overflows.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_secs = self.max_delay.as_secs_f64();
        let secs = (self.base_delay.as_secs_f64() * self.multiplier.powi(exponent))
            .min(max_secs)
            .max(0.0);
        Duration::from_secs_f64(secs)
    }

    /// Runs `op`, retrying while it fails with a transient error.
    pub async fn run<T, E, F, Fut>(
        &self,
        metrics: &Metrics,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient error; retrying"
                    );
                    metrics
                        .store_retries_total
                        .with_label_values(&[operation])
                        .inc();
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
