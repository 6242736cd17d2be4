//! OpenAI-compatible Chat Completions Provider
//!
//! Serves both OpenAI and Groq, which share the same wire format.
//! Returns the raw reply text; fenced blocks are parsed by the caller.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    ErrorClassifier, GenerateOptions, LlmProvider, LlmResponse, ProviderConfig, ResponseMetadata,
    ResponseTiming, TokenUsage,
};
use crate::types::{ForgeError, Result};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const GROQ_DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

const SYSTEM_PROMPT: &str = "You are a senior backend engineer. Follow the requested output \
format exactly: fenced ```json blocks for structured answers and **path** labels followed by \
fenced code blocks for source files.";

/// Wire-compatible service preset
#[derive(Debug, Clone, Copy)]
struct Flavor {
    name: &'static str,
    api_base: &'static str,
    model: &'static str,
    key_env: &'static str,
}

const OPENAI: Flavor = Flavor {
    name: "openai",
    api_base: OPENAI_API_BASE,
    model: OPENAI_DEFAULT_MODEL,
    key_env: "OPENAI_API_KEY",
};

const GROQ: Flavor = Flavor {
    name: "groq",
    api_base: GROQ_API_BASE,
    model: GROQ_DEFAULT_MODEL,
    key_env: "GROQ_API_KEY",
};

/// Chat completions provider with secure API key handling
pub struct OpenAiProvider {
    name: &'static str,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.name)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    /// OpenAI endpoint; key from config or `OPENAI_API_KEY`
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Self::build(config, OPENAI)
    }

    /// Groq endpoint; key from config or `GROQ_API_KEY`
    pub fn groq(config: ProviderConfig) -> Result<Self> {
        Self::build(config, GROQ)
    }

    fn build(config: ProviderConfig, flavor: Flavor) -> Result<Self> {
        let api_key_str = config
            .api_key
            .or_else(|| std::env::var(flavor.key_env).ok())
            .ok_or_else(|| {
                ForgeError::Config(format!(
                    "{} API key not found. Set {} env var or provide llm.api_key in config",
                    flavor.name, flavor.key_env
                ))
            })?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| flavor.api_base.to_string())
            .trim_end_matches('/')
            .to_string();

        let model = config.model.unwrap_or_else(|| flavor.model.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ForgeError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: flavor.name,
            api_key: SecretString::from(api_key_str),
            api_base,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_request(&self, prompt: &str, options: &GenerateOptions) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: options.temperature.unwrap_or(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<LlmResponse> {
        let request = self.build_request(prompt, options);
        info!(
            "Generating with {} (model: {}, temperature: {})",
            self.name, self.model, request.temperature
        );

        let start_time = Instant::now();
        let url = format!("{}/chat/completions", self.api_base);

        debug!("Sending request to {} API", self.name);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ForgeError::LlmApi(format!("{} request failed: {}", self.name, e)))?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ForgeError::Llm(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("{} API error ({}): {}", self.name, status, body),
                self.name,
            )));
        }

        let response_body: ChatCompletionResponse = response.json().await.map_err(|e| {
            ForgeError::LlmApi(format!("Failed to parse {} response: {}", self.name, e))
        })?;

        let usage = response_body
            .usage
            .map(|u| TokenUsage::from_openai(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let content = response_body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ForgeError::LlmApi(format!("No content in {} response", self.name)))?;

        debug!("Received {} chars from {}", content.len(), self.name);

        Ok(LlmResponse::with_metrics(
            content,
            usage,
            ResponseTiming::from_duration(elapsed),
            ResponseMetadata {
                model: self.model.clone(),
                provider: self.name.to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.api_base);

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("{} API is available", self.name);
                Ok(true)
            }
            Ok(resp) => {
                warn!("{} API check failed: {}", self.name, resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("{} API check failed: {}", self.name, e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}
