//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/reqforge/) and project (.reqforge/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{llm as llm_constants, pipeline as pipeline_constants, retry};
use crate::types::{ForgeError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Generation pipeline settings
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ForgeError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("temperature", self.llm.temperature),
            ("validation_temperature", self.llm.validation_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ForgeError::Config(format!(
                    "LLM {} must be between 0.0 and 2.0, got {}",
                    name, value
                )));
            }
        }

        if self.llm.timeout_secs == 0 {
            return Err(ForgeError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(ForgeError::Config(
                "LLM max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.run_timeout_secs == 0 {
            return Err(ForgeError::Config(
                "Pipeline run_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.output_dir.as_os_str().is_empty() {
            return Err(ForgeError::Config(
                "Pipeline output_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "groq", "openai", "ollama", "scripted"
    pub provider: String,

    /// Model name
    pub model: String,

    /// API key; falls back to the provider's environment variable
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL override
    pub api_base: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for extraction and generation calls
    pub temperature: f32,

    /// Temperature for the reviewer call
    pub validation_temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: usize,

    /// Retries after the first attempt for recoverable provider errors
    pub max_retries: usize,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("validation_temperature", &self.validation_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: llm_constants::DEFAULT_PROVIDER.to_string(),
            model: llm_constants::DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base: None,
            timeout_secs: llm_constants::DEFAULT_TIMEOUT_SECS,
            temperature: llm_constants::DEFAULT_TEMPERATURE,
            validation_temperature: llm_constants::VALIDATION_TEMPERATURE,
            max_tokens: llm_constants::DEFAULT_MAX_TOKENS,
            max_retries: retry::DEFAULT_MAX_RETRIES,
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory under which each project gets its own folder
    pub output_dir: PathBuf,

    /// Regeneration ceiling
    pub max_regenerations: u32,

    /// Wall-clock ceiling for a single run
    pub run_timeout_secs: u64,

    /// Issue the four extraction calls together instead of in sequence
    pub concurrent_extraction: bool,

    /// Base URL of an external trace viewer; the run's project id is appended
    pub trace_base_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(pipeline_constants::DEFAULT_OUTPUT_DIR),
            max_regenerations: pipeline_constants::DEFAULT_MAX_REGENERATIONS,
            run_timeout_secs: pipeline_constants::DEFAULT_RUN_TIMEOUT_SECS,
            concurrent_extraction: false,
            trace_base_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.max_regenerations, 3);
        assert_eq!(config.llm.max_retries, 2);
        assert!(!config.pipeline.concurrent_extraction);
    }

    #[test]
    fn test_validate_rejects_bad_temperature() {
        let mut config = Config::default();
        config.llm.validation_temperature = 3.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("validation_temperature"));
    }

    #[test]
    fn test_validate_rejects_zero_run_timeout() {
        let mut config = Config::default();
        config.pipeline.run_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_is_redacted_and_not_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("gsk_secret".to_string());

        let debug = format!("{:?}", config.llm);
        assert!(!debug.contains("gsk_secret"));
        assert!(debug.contains("[REDACTED]"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("gsk_secret"));
    }
}
