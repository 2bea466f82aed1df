//! Bounded retry/backoff wrapper around a generation provider.
//!
//! Transient failures (throttling, 5xx, timeouts, resets) are retried up
//! to [`RetryConfig::max_attempts`] times with exponential backoff plus
//! jitter. Everything else fails immediately. Each attempt runs under
//! its own timeout so a hung provider call cannot stall a worker past
//! the bound.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use restyle_core::contracts::{
    GenerationOutput, GenerationProvider, GenerationRequest, ImagePayload, ProviderError,
};

/// Tunable parameters for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base backoff unit; the wait after failed attempt `n` is
    /// `base_delay * 2^(n-1)` plus jitter.
    pub base_delay: Duration,
    /// Upper bound on the random jitter added to each wait.
    pub max_jitter: Duration,
    /// Independent timeout applied to every attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

/// Deterministic part of the backoff: the wait after `failed_attempt`
/// (1-based) has failed, before jitter.
pub fn backoff_base(failed_attempt: u32, config: &RetryConfig) -> Duration {
    config.base_delay * 2u32.saturating_pow(failed_attempt.saturating_sub(1))
}

/// Retrying adapter around any [`GenerationProvider`].
pub struct RetryingGenerator<P> {
    inner: P,
    config: RetryConfig,
}

impl<P> RetryingGenerator<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.config.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

#[async_trait]
impl<P: GenerationProvider> GenerationProvider for RetryingGenerator<P> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                let delay = backoff_base(attempt - 1, &self.config) + self.jitter();
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before generation retry",
                );
                tokio::time::sleep(delay).await;
            }

            let outcome =
                tokio::time::timeout(self.config.attempt_timeout, self.inner.generate(request))
                    .await;

            match outcome {
                Err(_elapsed) => {
                    tracing::warn!(
                        attempt,
                        timeout_secs = self.config.attempt_timeout.as_secs(),
                        "Generation attempt timed out",
                    );
                    last_error = Some(ProviderError::Timeout);
                }
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(e)) if e.is_retryable() => {
                    tracing::warn!(attempt, error = %e, "Generation attempt failed, will retry");
                    last_error = Some(e);
                }
                Ok(Err(e)) => return Err(e),
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());
        Err(ProviderError::RetriesExhausted {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    async fn resolve_image(&self, payload: &ImagePayload) -> Result<Vec<u8>, ProviderError> {
        self.inner.resolve_image(payload).await
    }
}
