//! Timeout Handling
//!
//! Per-call and per-run timeout budgets plus a helper for wrapping async
//! operations.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, with_timeout};
//!
//! let config = TimeoutConfig::default();
//! let result = with_timeout(
//!     config.llm_request,
//!     async { /* LLM call */ },
//!     "LLM request"
//! ).await?;
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::constants::{llm as llm_constants, pipeline as pipeline_constants};
use crate::types::{ForgeError, Result};

/// Timeout budgets for a pipeline run
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Ceiling for one model call
    pub llm_request: Duration,
    /// Wall-clock ceiling for the whole run
    pub run: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_request: Duration::from_secs(llm_constants::DEFAULT_TIMEOUT_SECS),
            run: Duration::from_secs(pipeline_constants::DEFAULT_RUN_TIMEOUT_SECS),
        }
    }
}

impl TimeoutConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            llm_request: Duration::from_secs(config.llm.timeout_secs),
            run: Duration::from_secs(config.pipeline.run_timeout_secs),
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns [`ForgeError::Timeout`] if the operation doesn't complete within
/// `timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ForgeError::timeout(operation_name, timeout)),
    }
}

/// Wall-clock budget checked between stages
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_from_config() {
        let mut config = Config::default();
        config.llm.timeout_secs = 12;
        config.pipeline.run_timeout_secs = 34;
        let timeouts = TimeoutConfig::from_config(&config);
        assert_eq!(timeouts.llm_request, Duration::from_secs(12));
        assert_eq!(timeouts.run, Duration::from_secs(34));
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, ForgeError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ForgeError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result.unwrap_err(), ForgeError::Timeout { .. }));
    }

    #[test]
    fn test_deadline_zero_budget_is_expired() {
        let deadline = Deadline::start(Duration::ZERO);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);

        let generous = Deadline::start(Duration::from_secs(3600));
        assert!(!generous.is_expired());
    }
}
