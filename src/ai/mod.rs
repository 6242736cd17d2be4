//! AI Integration Layer
//!
//! Model providers, prompt construction, call timeouts and usage metrics
//! shared by every pipeline stage.

pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod timeout;

pub use metrics::{MetricsCollector, MetricsSummary, SharedMetrics, StageMetrics};
pub use prompt::{PromptBuilder, PromptSection};
pub use provider::{
    ErrorCategory, ErrorClassifier, GenerateOptions, LlmError, LlmProvider, LlmResponse,
    OllamaProvider, OpenAiProvider, ProviderConfig, ResponseMetadata, ResponseTiming,
    RetryPolicy, RetryingProvider, ScriptedCall, ScriptedProvider, ScriptedReply, SharedProvider,
    TokenUsage, create_provider,
};
pub use timeout::{Deadline, TimeoutConfig, with_timeout};
