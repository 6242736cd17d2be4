//! reqforge - Requirements Document to FastAPI Project Generator
//!
//! Reads a software requirements document, asks a language model to extract
//! structured requirements, and writes a runnable FastAPI project. A reviewer
//! model grades the result and may send one generator back for another pass,
//! up to a configured number of regenerations.
//!
//! ## Core Features
//!
//! - **Document ingestion**: `.docx` (WordprocessingML), `.txt` and `.md`
//! - **Requirements extraction**: endpoints, schema, business rules, auth
//! - **Code generation**: SQLAlchemy models, FastAPI routes, config and docs
//! - **Bounded review loop**: reviewer-driven regeneration with a hard ceiling
//! - **Provider abstraction**: Groq/OpenAI-compatible, Ollama, scripted replay
//!
//! ## Quick Start
//!
//! ```ignore
//! use reqforge::{Config, GenerationPipeline, create_provider, ProviderConfig};
//!
//! let config = Config::default();
//! let provider = create_provider(&ProviderConfig::from(&config.llm))?;
//! let pipeline = GenerationPipeline::new(provider, config);
//! let run = pipeline.run(Path::new("srs.docx")).await;
//! println!("{:?} -> {:?}", run.outcome, run.project_path());
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: LLM providers, prompts, timeouts and metrics
//! - [`pipeline`]: stage state, stages and the run controller
//! - [`config`]: layered configuration
//! - [`cli`]: command implementations for the `reqforge` binary

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, LlmConfig, PipelineConfig};

// Error Types
pub use types::error::{ErrorCategory, ForgeError, Result};
pub use types::ProjectId;

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    FileRecord, GenerationPipeline, PipelineRun, PipelineState, RegenerationTarget, RunOutcome,
    RunStatus, RunSummary, Stage, ValidationVerdict,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    // Providers
    LlmProvider,
    LlmResponse,
    // Metrics
    MetricsCollector,
    MetricsSummary,
    OllamaProvider,
    OpenAiProvider,
    ProviderConfig,
    ScriptedProvider,
    SharedProvider,
    // Timeout
    TimeoutConfig,
    create_provider,
    with_timeout,
};
