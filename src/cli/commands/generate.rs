//! Generate Command
//!
//! Turn a requirements document into a FastAPI project.
//!
//! Usage:
//!   reqforge generate <DOCUMENT> [--output DIR] [--provider P] [--model M]
//!                     [--max-regenerations N] [--concurrent] [--json]
//!   reqforge generate <DOCUMENT> --provider scripted --script replies.yaml

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::info;

use crate::ai::{ProviderConfig, ScriptedProvider, SharedProvider, create_provider};
use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader};
use crate::pipeline::{GenerationPipeline, RunOutcome, RunSummary};
use crate::types::{ForgeError, Result};

const SCRIPTED_PROVIDER: &str = "scripted";

/// Options collected from the command line
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub document: PathBuf,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_regenerations: Option<u32>,
    pub concurrent: bool,
    pub script: Option<PathBuf>,
    pub json: bool,
}

/// Apply command-line overrides on top of the loaded configuration
pub fn apply_overrides(config: &mut Config, options: &GenerateOptions) {
    if let Some(output) = &options.output {
        config.pipeline.output_dir = output.clone();
    }
    if let Some(provider) = &options.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(model) = &options.model {
        config.llm.model = model.clone();
    }
    if let Some(max) = options.max_regenerations {
        config.pipeline.max_regenerations = max;
    }
    if options.concurrent {
        config.pipeline.concurrent_extraction = true;
    }
}

/// Build the provider named in the configuration
pub fn build_provider(config: &Config, script: Option<&Path>) -> Result<SharedProvider> {
    if config.llm.provider == SCRIPTED_PROVIDER {
        let script = script.ok_or_else(|| {
            ForgeError::Config("The scripted provider needs --script <FILE>".to_string())
        })?;
        return Ok(Arc::new(ScriptedProvider::from_yaml_file(script)?));
    }
    create_provider(&ProviderConfig::from(&config.llm))
}

/// Run the pipeline and report the result
pub fn run(options: GenerateOptions) -> Result<RunOutcome> {
    let mut config = match &options.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    apply_overrides(&mut config, &options);
    config.validate()?;

    let provider = build_provider(&config, options.script.as_deref())?;
    info!(
        "Using LLM provider: {} ({})",
        provider.name(),
        provider.model()
    );

    let pipeline = GenerationPipeline::new(provider, config);
    let rt = Runtime::new()?;
    let run = rt.block_on(pipeline.run(&options.document));

    let summary = run.summary();
    if options.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(run.outcome)
}

fn print_summary(summary: &RunSummary) {
    let out = Output::new();
    out.header("reqforge");

    match &summary.outcome {
        RunOutcome::Completed => out.success("Project generated"),
        RunOutcome::Exhausted => out.warning(&format!(
            "Project generated after {} regeneration attempts; reviewer still reports issues",
            summary.max_regenerations
        )),
        RunOutcome::Failed { error } => out.error(error),
    }

    if let Some(id) = &summary.project_id {
        out.info(&format!("Project ID:    {}", id));
    }
    if let Some(path) = &summary.project_path {
        out.info(&format!("Location:      {}", path.display()));
    }
    out.info(&format!("Files:         {}", summary.files_generated));
    out.info(&format!(
        "Regenerations: {}/{}",
        summary.regeneration_count, summary.max_regenerations
    ));
    if let Some(score) = summary.score {
        out.info(&format!("Review score:  {}/100", score));
    }
    if let Some(url) = &summary.trace_url {
        out.info(&format!("Trace:         {}", url));
    }

    if !summary.issues.is_empty() {
        out.section("Issues");
        for issue in &summary.issues {
            out.bullet(issue);
        }
    }
    if !summary.recommendations.is_empty() {
        out.section("Recommendations");
        for rec in &summary.recommendations {
            out.bullet(rec);
        }
    }

    out.section("Metrics");
    println!("{}", summary.metrics.display());
}
