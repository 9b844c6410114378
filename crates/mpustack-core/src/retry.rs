//! Bounded retry for compose and copy calls.
//!
//! Only [transient](BackendError::is_transient) failures are retried. The
//! delay before retry `n` (0-based) is `min(base * 2^n, max)`, plus a random
//! jitter in `[0, delay / 2)` when enabled.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::backend::{BackendClient, BackendResult, CopyRequest, ObjectInfo};
use crate::config::MpuConfig;
use crate::error::BackendError;

/// Retry policy applied to compose and copy calls.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use mpustack_core::retry::RetryPolicy;
///
/// let policy = RetryPolicy::new(4, Duration::from_millis(10), Duration::from_millis(50), false);
/// assert_eq!(policy.delay_for(0), Duration::from_millis(10));
/// assert_eq!(policy.delay_for(2), Duration::from_millis(40));
/// assert_eq!(policy.delay_for(3), Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` total attempts.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter,
        }
    }

    /// Build the policy described by `config`.
    #[must_use]
    pub fn from_config(config: &MpuConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            config.retry_base_delay(),
            config.retry_max_delay(),
            config.retry_jitter,
        )
    }

    /// Total attempts allowed, first try included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let half = u64::try_from(delay.as_millis() / 2).unwrap_or(u64::MAX);
        if !self.jitter || half == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::random::<u64>() % half)
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `op` receives the 0-based attempt number.
    pub async fn run<T, F, Fut>(&self, description: &str, mut op: F) -> BackendResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.jittered(self.delay_for(attempt));
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        description,
                        error = %e,
                        "transient backend failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Compose `sources` into `dest` with retry.
    pub async fn retry_compose(
        &self,
        backend: &dyn BackendClient,
        bucket: &str,
        sources: &[String],
        dest: &str,
    ) -> Result<ObjectInfo, BackendError> {
        self.run(dest, |_| backend.compose(bucket, sources, dest))
            .await
    }

    /// Copy an object with retry.
    pub async fn retry_copy(
        &self,
        backend: &dyn BackendClient,
        req: &CopyRequest,
    ) -> Result<ObjectInfo, BackendError> {
        self.run(&req.dst_key, |_| backend.copy_object(req.clone()))
            .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&MpuConfig::default())
    }
}
