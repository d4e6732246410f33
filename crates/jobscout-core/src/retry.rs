//! Retry with exponential backoff for remote tool calls.
//!
//! Wraps any [`ToolClient`] so that transient failures (see
//! [`AppError::is_retryable`]) are retried after `base * 2^attempt`, while
//! terminal failures surface immediately.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use jobscout_core::retry::{RetryConfig, RetryingToolClient};
//!
//! # use jobscout_core::traits::{Capability, ToolClient};
//! # #[derive(Clone)] struct MyClient;
//! # impl ToolClient for MyClient {
//! #     async fn invoke(&self, _: &Capability) -> Result<String, jobscout_core::AppError> { todo!() }
//! # }
//! let config = RetryConfig::default().with_base_delay(Duration::from_millis(500));
//! let client = RetryingToolClient::new(MyClient, config);
//! ```

use std::time::Duration;

use crate::error::AppError;
use crate::traits::{Capability, ToolClient};

/// Retry configuration with exponential backoff.
///
/// Delay schedule with the defaults: 1s, 2s, 4s (capped at 30s).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retrying after failed attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.base_delay.checked_mul(factor).unwrap_or(self.max_delay);
        std::cmp::min(delay, self.max_delay)
    }
}

/// A [`ToolClient`] wrapper that retries transient failures.
///
/// Does not touch quota accounting: a logical request is billed once by the
/// caller no matter how many attempts it took.
#[derive(Clone)]
pub struct RetryingToolClient<T> {
    inner: T,
    config: RetryConfig,
}

impl<T: ToolClient> RetryingToolClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl<T: ToolClient> ToolClient for RetryingToolClient<T> {
    async fn invoke(&self, capability: &Capability) -> Result<String, AppError> {
        let total_attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 0..total_attempts {
            match self.inner.invoke(capability).await {
                Ok(text) => {
                    if attempt > 0 {
                        tracing::info!(
                            tool = capability.tool_name(),
                            attempt = attempt + 1,
                            "Remote call succeeded after retry"
                        );
                    }
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    if attempt + 1 < total_attempts {
                        let delay = self.config.delay_for_attempt(attempt);
                        tracing::warn!(
                            tool = capability.tool_name(),
                            attempt = attempt + 1,
                            max_attempts = total_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Transient remote failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::debug!(tool = capability.tool_name(), error = %e, "Terminal remote failure");
                    return Err(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        Err(AppError::RemoteUnavailable {
            attempts: total_attempts,
            last_error,
        })
    }
}
