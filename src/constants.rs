//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// LLM provider constants
pub mod llm {
    /// Default provider name
    pub const DEFAULT_PROVIDER: &str = "groq";

    /// Default model for the groq provider
    pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

    /// Temperature for extraction and code generation calls
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;

    /// Lower temperature used by the reviewer
    pub const VALIDATION_TEMPERATURE: f32 = 0.1;

    /// Per-call request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Maximum tokens to generate per call
    pub const DEFAULT_MAX_TOKENS: usize = 8192;
}

/// Retry constants for provider calls
pub mod retry {
    /// Default retries after the first attempt
    pub const DEFAULT_MAX_RETRIES: usize = 2;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Pipeline constants
pub mod pipeline {
    /// Regeneration ceiling
    pub const DEFAULT_MAX_REGENERATIONS: u32 = 3;

    /// Root directory for generated projects
    pub const DEFAULT_OUTPUT_DIR: &str = "generated_projects";

    /// Wall-clock ceiling for one run (seconds)
    pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 1800;

    /// Upper bound of the reviewer score
    pub const MAX_SCORE: i64 = 100;
}

/// Generated project layout
pub mod layout {
    /// Directories created by the scaffolder, relative to the project root
    pub const DIRECTORIES: &[&str] = &[
        "app",
        "app/api",
        "app/api/routes",
        "app/models",
        "app/services",
        "tests",
    ];

    /// Python package markers written by the scaffolder
    pub const PACKAGE_MARKERS: &[&str] = &[
        "app/__init__.py",
        "app/api/__init__.py",
        "app/api/routes/__init__.py",
        "app/models/__init__.py",
        "app/services/__init__.py",
    ];

    pub const MODELS_DIR: &str = "app/models";
    pub const ROUTES_DIR: &str = "app/api/routes";
    pub const DOCS_DIR: &str = "docs";
}

/// Document ingestion constants
pub mod ingest {
    /// Main part of an Office Open XML word-processing package
    pub const DOCX_MAIN_PART: &str = "word/document.xml";

    /// Upper bound for the decompressed main part (bytes)
    pub const MAX_DOCUMENT_XML_BYTES: u64 = 64 * 1024 * 1024;
}
