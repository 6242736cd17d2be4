//! LLM Provider Abstraction
//!
//! Defines the LlmProvider trait for free-form text generation.
//! All providers return `LlmResponse` with token usage metrics.
//!
//! ## Modules
//!
//! - `openai`: OpenAI-compatible chat completions (OpenAI, Groq)
//! - `ollama`: Local Ollama models
//! - `retry`: Exponential-backoff decorator for recoverable errors
//! - `scripted`: Deterministic replies for tests and dry runs

mod ollama;
mod openai;
mod retry;
mod scripted;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use retry::{RetryPolicy, RetryingProvider};
pub use scripted::{ScriptedCall, ScriptedProvider, ScriptedReply};

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::types::{ForgeError, Result};

// =============================================================================
// LLM Response with Usage Metrics
// =============================================================================

/// Complete LLM response including raw text and usage metrics
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text, unparsed
    pub content: String,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Response timing
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
}

impl LlmResponse {
    pub fn with_metrics(
        content: String,
        usage: TokenUsage,
        timing: ResponseTiming,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            content,
            usage,
            timing,
            metadata,
        }
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Create from OpenAI-style usage response
    pub fn from_openai(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
        }
    }

    /// Create from Ollama-style usage response
    pub fn from_ollama(prompt_eval_count: u32, eval_count: u32) -> Self {
        Self {
            input_tokens: prompt_eval_count,
            output_tokens: eval_count,
        }
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    /// Model used
    pub model: String,
    /// Provider name
    pub provider: String,
}

/// Per-call overrides
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerateOptions {
    /// Overrides the provider's configured temperature
    pub temperature: Option<f32>,
}

impl GenerateOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }
}

/// Shared LLM provider type; many pipeline runs may hold the same handle.
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for LLM providers
///
/// API keys are never serialized and are redacted in debug output. Each
/// provider converts the key to `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "groq", "openai", "ollama"
    pub provider: String,
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Default temperature for generation
    pub temperature: f32,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// Retries for recoverable errors (0 disables the retry decorator)
    pub max_retries: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for ProviderConfig {
    fn from(llm: &LlmConfig) -> Self {
        Self {
            provider: llm.provider.clone(),
            model: Some(llm.model.clone()).filter(|m| !m.is_empty()),
            timeout_secs: llm.timeout_secs,
            temperature: llm.temperature,
            api_key: llm.api_key.clone(),
            api_base: llm.api_base.clone(),
            max_tokens: llm.max_tokens,
            max_retries: llm.max_retries,
        }
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// Text-generation backend used by every model-backed pipeline stage
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a rendered prompt and return the model's raw reply.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    let base: SharedProvider = match config.provider.as_str() {
        "groq" => Arc::new(OpenAiProvider::groq(config.clone())?),
        "openai" => Arc::new(OpenAiProvider::new(config.clone())?),
        "ollama" => Arc::new(OllamaProvider::new(config.clone())?),
        _ => {
            return Err(ForgeError::Config(format!(
                "Unknown provider: {}. Supported: groq, openai, ollama",
                config.provider
            )));
        }
    };

    if config.max_retries == 0 {
        return Ok(base);
    }
    Ok(Arc::new(RetryingProvider::new(
        base,
        RetryPolicy::with_max_retries(config.max_retries),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_rejected() {
        let config = ProviderConfig {
            provider: "claude-desktop".to_string(),
            ..Default::default()
        };
        let err = create_provider(&config).err().expect("must fail");
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_ollama_provider_wrapped_in_retry() {
        let config = ProviderConfig {
            provider: "ollama".to_string(),
            model: Some("llama3:latest".to_string()),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "llama3:latest");
    }

    #[test]
    fn test_provider_config_from_llm_config() {
        let llm = LlmConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let config = ProviderConfig::from(&llm);
        assert_eq!(config.provider, "groq");
        assert_eq!(config.max_retries, 2);
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
