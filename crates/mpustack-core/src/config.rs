//! Engine configuration.
//!
//! Provides [`MpuConfig`], which bounds compose fan-in, request concurrency,
//! retry behavior and the rewrite continuation loop. Values are loaded from
//! environment variables with [`MpuConfig::from_env`] or built explicitly with
//! the typed builder.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::MpuError;

/// Multipart engine configuration.
///
/// # Examples
///
/// ```
/// use mpustack_core::config::MpuConfig;
///
/// let config = MpuConfig::default();
/// assert_eq!(config.compose_fan_in, 32);
/// assert_eq!(config.max_parts, 10_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct MpuConfig {
    /// Maximum number of sources one compose call may consume.
    #[builder(default = 32)]
    pub compose_fan_in: usize,

    /// Maximum number of parts accepted by a completion request.
    #[builder(default = 10_000)]
    pub max_parts: usize,

    /// Maximum number of backend requests in flight within one parallel step.
    #[builder(default = 64)]
    pub max_in_flight: usize,

    /// Total attempts (first try included) for compose and copy calls.
    #[builder(default = 5)]
    pub retry_max_attempts: u32,

    /// Backoff delay before the first retry, in milliseconds.
    #[builder(default = 100)]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay, in milliseconds.
    #[builder(default = 10_000)]
    pub retry_max_delay_ms: u64,

    /// Whether to add random jitter to backoff delays.
    #[builder(default = true)]
    pub retry_jitter: bool,

    /// Maximum continuation calls issued for a single rewrite.
    #[builder(default = 128)]
    pub max_rewrite_steps: u32,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for MpuConfig {
    fn default() -> Self {
        Self {
            compose_fan_in: 32,
            max_parts: 10_000,
            max_in_flight: 64,
            retry_max_attempts: 5,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 10_000,
            retry_jitter: true,
            max_rewrite_steps: 128,
            log_level: String::from("info"),
        }
    }
}

impl MpuConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MPU_COMPOSE_FAN_IN` | `32` |
    /// | `MPU_MAX_PARTS` | `10000` |
    /// | `MPU_MAX_IN_FLIGHT` | `64` |
    /// | `MPU_RETRY_MAX_ATTEMPTS` | `5` |
    /// | `MPU_RETRY_BASE_DELAY_MS` | `100` |
    /// | `MPU_RETRY_MAX_DELAY_MS` | `10000` |
    /// | `MPU_RETRY_JITTER` | `true` |
    /// | `MPU_MAX_REWRITE_STEPS` | `128` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// Unparseable numeric values are ignored and the default is kept.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_parse("MPU_COMPOSE_FAN_IN") {
            config.compose_fan_in = n;
        }
        if let Some(n) = env_parse("MPU_MAX_PARTS") {
            config.max_parts = n;
        }
        if let Some(n) = env_parse("MPU_MAX_IN_FLIGHT") {
            config.max_in_flight = n;
        }
        if let Some(n) = env_parse("MPU_RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = n;
        }
        if let Some(n) = env_parse("MPU_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay_ms = n;
        }
        if let Some(n) = env_parse("MPU_RETRY_MAX_DELAY_MS") {
            config.retry_max_delay_ms = n;
        }
        if let Ok(v) = std::env::var("MPU_RETRY_JITTER") {
            config.retry_jitter = parse_bool(&v);
        }
        if let Some(n) = env_parse("MPU_MAX_REWRITE_STEPS") {
            config.max_rewrite_steps = n;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Check that the configuration can drive a completion.
    ///
    /// Two reduction passes followed by one merge must be able to absorb
    /// `max_parts` parts at the configured fan-in.
    pub fn validate(&self) -> Result<(), MpuError> {
        if self.compose_fan_in < 2 {
            return Err(MpuError::invalid_request("compose fan-in must be at least 2"));
        }
        if self.max_in_flight == 0 {
            return Err(MpuError::invalid_request("max in-flight must be positive"));
        }
        if self.retry_max_attempts == 0 {
            return Err(MpuError::invalid_request("retry attempts must be positive"));
        }
        if self.max_rewrite_steps == 0 {
            return Err(MpuError::invalid_request("rewrite steps must be positive"));
        }
        let survivors = self
            .max_parts
            .div_ceil(self.compose_fan_in)
            .div_ceil(self.compose_fan_in);
        if survivors > self.compose_fan_in {
            return Err(MpuError::invalid_request(format!(
                "{} parts cannot be merged with a fan-in of {}",
                self.max_parts, self.compose_fan_in
            )));
        }
        Ok(())
    }

    /// Base backoff delay as a [`Duration`].
    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Maximum backoff delay as a [`Duration`].
    #[must_use]
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
