//! Retrying Provider
//!
//! Decorator that retries recoverable provider errors with exponential
//! backoff and jitter. Classification goes through [`ErrorClassifier`]:
//! rate limits, network failures, transient server errors and timeouts
//! are retried; auth, bad-request and unknown errors fail immediately.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;
use tracing::warn;

use super::{ErrorClassifier, GenerateOptions, LlmProvider, LlmResponse, SharedProvider};
use crate::constants::retry as retry_constants;
use crate::types::{ForgeError, Result};

/// Backoff parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
            backoff_factor: retry_constants::BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.backoff_factor)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Provider wrapper adding bounded retries
pub struct RetryingProvider {
    inner: SharedProvider,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: SharedProvider, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn should_retry(&self, err: &ForgeError) -> bool {
        ErrorClassifier::classify_forge_error(err, self.inner.name()).is_retryable()
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<LlmResponse> {
        (|| async { self.inner.generate(prompt, options).await })
            .retry(self.policy.backoff())
            .sleep(tokio::time::sleep)
            .when(|e| self.should_retry(e))
            .notify(|err, delay| {
                warn!(
                    provider = self.inner.name(),
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after recoverable error: {}",
                    err
                );
            })
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{ScriptedProvider, ScriptedReply};
    use crate::types::{ErrorCategory, LlmError};
    use std::sync::Arc;

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let scripted = Arc::new(ScriptedProvider::new());
        scripted.push_default(ScriptedReply::error(LlmError::new(
            ErrorCategory::RateLimit,
            "429",
        )));
        scripted.push_default(ScriptedReply::text("ok"));

        let provider = RetryingProvider::new(scripted.clone(), fast_policy(2));
        let response = provider
            .generate("prompt", &GenerateOptions::default())
            .await
            .unwrap();

        assert_eq!(response.content, "ok");
        assert_eq!(scripted.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let scripted = Arc::new(ScriptedProvider::new());
        scripted.push_default(ScriptedReply::error(LlmError::new(
            ErrorCategory::Auth,
            "bad key",
        )));
        scripted.push_default(ScriptedReply::text("never reached"));

        let provider = RetryingProvider::new(scripted.clone(), fast_policy(3));
        let result = provider.generate("prompt", &GenerateOptions::default()).await;

        assert!(result.is_err());
        assert_eq!(scripted.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let scripted = Arc::new(ScriptedProvider::new());
        for _ in 0..5 {
            scripted.push_default(ScriptedReply::error(LlmError::new(
                ErrorCategory::Network,
                "connection reset",
            )));
        }

        let provider = RetryingProvider::new(scripted.clone(), fast_policy(2));
        let result = provider.generate("prompt", &GenerateOptions::default()).await;

        assert!(result.is_err());
        assert_eq!(scripted.calls().len(), 3);
    }
}
