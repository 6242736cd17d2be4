//! Requirements-to-FastAPI Pipeline
//!
//! Nine stages share one [`PipelineState`] that is handed from stage to
//! stage by value:
//!
//! ```text
//! Parse → Analyze → Scaffold → Models → Routes → Config → Main → Docs → Validate
//!                                 ↑                                        │
//!                                 └──────── regeneration (bounded) ────────┘
//! ```
//!
//! Only parsing, scaffolding and a missing requirements text stop a run.
//! Every other failure is written to the message log and the run continues.

pub mod blocks;
pub mod context;
pub mod controller;
pub mod extract;
pub mod generators;
pub mod ingest;
pub mod prompts;
pub mod scaffold;
pub mod state;
pub mod validate;

// ============================================================================
// Controller Exports
// ============================================================================

pub use context::StageContext;
pub use controller::{GenerationPipeline, PipelineRun, RunOutcome, RunSummary};

// ============================================================================
// State Exports
// ============================================================================

pub use state::{
    FileKind, FileRecord, Message, PipelineState, Record, RegenerationDecision,
    RegenerationTarget, Role, RunStatus, Stage, ValidationVerdict,
};

// ============================================================================
// Stage Helpers
// ============================================================================

pub use blocks::{LabeledBlock, extract_json_block, parse_labeled_blocks};
pub use extract::Artifact;
pub use generators::{CodeGenerator, StageOutput};
pub use ingest::DocumentFormat;
