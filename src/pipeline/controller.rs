//! Pipeline Controller
//!
//! Drives a single run through the fixed stage order:
//!
//! ```text
//! parse → analyze → scaffold → gen_models → gen_routes → gen_config
//!       → gen_main → gen_docs → validate ─┐
//!                      ▲                   │ regeneration target
//!                      └───────────────────┘
//! ```
//!
//! A regeneration jumps back to the named generator and falls through every
//! later stage again. The run stops early only when a stage marks the state
//! failed or the wall-clock budget runs out.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::context::StageContext;
use super::generators;
use super::state::{PipelineState, RunStatus, Stage};
use super::{extract, ingest, scaffold, validate};
use crate::ai::{Deadline, MetricsSummary, SharedProvider};
use crate::config::Config;
use crate::types::{ForgeError, ProjectId, Result};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Reviewer accepted the output, or review was skipped after a failure
    Completed,
    /// Reviewer still wanted changes when the regeneration ceiling was hit
    Exhausted,
    Failed { error: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Final state of a run plus how it ended
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub state: PipelineState,
    pub outcome: RunOutcome,
    pub metrics: MetricsSummary,
}

impl PipelineRun {
    pub fn project_id(&self) -> Option<&ProjectId> {
        self.state.project_id()
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.state.project_path()
    }

    pub fn trace_url(&self) -> Option<&str> {
        self.state.trace_url()
    }

    pub fn summary(&self) -> RunSummary {
        let verdict = self.state.validation_results();
        RunSummary {
            project_id: self.project_id().map(ToString::to_string),
            project_path: self.project_path().map(Path::to_path_buf),
            outcome: self.outcome.clone(),
            status: self.state.status(),
            regeneration_count: self.state.regeneration_count(),
            max_regenerations: self.state.max_regenerations(),
            files_generated: self.state.generated_files().len(),
            valid: verdict.map(|v| v.valid),
            score: verdict.map(|v| v.score),
            issues: verdict.map(|v| v.issues.clone()).unwrap_or_default(),
            recommendations: verdict
                .map(|v| v.recommendations.clone())
                .unwrap_or_default(),
            messages: self
                .state
                .messages()
                .iter()
                .map(|m| m.content.clone())
                .collect(),
            trace_url: self.trace_url().map(str::to_string),
            metrics: self.metrics.clone(),
        }
    }
}

/// Serializable report of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub project_id: Option<String>,
    pub project_path: Option<PathBuf>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub status: RunStatus,
    pub regeneration_count: u32,
    pub max_regenerations: u32,
    pub files_generated: usize,
    pub valid: Option<bool>,
    pub score: Option<u8>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub messages: Vec<String>,
    pub trace_url: Option<String>,
    pub metrics: MetricsSummary,
}

/// Requirements-to-project pipeline
///
/// Holds only the provider handle and configuration, so one instance can
/// serve many concurrent runs.
pub struct GenerationPipeline {
    provider: SharedProvider,
    config: Config,
}

impl GenerationPipeline {
    pub fn new(provider: SharedProvider, config: Config) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage for `document`
    #[instrument(skip(self, document), fields(document = %document.display()))]
    pub async fn run(&self, document: &Path) -> PipelineRun {
        let ctx = StageContext::new(self.provider.clone(), &self.config);
        let deadline = Deadline::start(ctx.timeouts().run);

        let mut state = PipelineState::new(document, self.config.pipeline.max_regenerations);
        state.set_status(RunStatus::Processing);
        info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            max_regenerations = state.max_regenerations(),
            "Pipeline: Starting"
        );

        let mut next = Some(Stage::Parse);
        while let Some(stage) = next {
            if deadline.is_expired() {
                let err = ForgeError::timeout("pipeline run", deadline.budget());
                warn!("Run budget exhausted before {}", stage);
                state.fail(format!("Run aborted before {}: {}", stage.title(), err));
                break;
            }

            info!(
                "Stage {}/{}: {}",
                stage.as_u8(),
                Stage::COUNT,
                stage.title()
            );
            state = self.execute(&ctx, stage, state).await;

            if state.is_failed() {
                warn!("Pipeline stopped at {}", stage);
                break;
            }

            next = match stage {
                Stage::Validate => state.regeneration_target().map(|target| {
                    info!(
                        "Regeneration {}/{}: jumping back to {}",
                        state.regeneration_count(),
                        state.max_regenerations(),
                        target.stage()
                    );
                    target.stage()
                }),
                other => other.next(),
            };
        }

        self.finish(ctx, state)
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        stage: Stage,
        state: PipelineState,
    ) -> PipelineState {
        match stage {
            Stage::Parse => ingest::run(state),
            Stage::Analyze => extract::run(ctx, state).await,
            Stage::Scaffold => scaffold::run(ctx.output_root(), state),
            Stage::Validate => validate::run(ctx, state).await,
            generator_stage => match generators::for_stage(generator_stage) {
                Some(generator) => generators::run(generator.as_ref(), ctx, state).await,
                None => state,
            },
        }
    }

    fn finish(&self, ctx: StageContext, mut state: PipelineState) -> PipelineRun {
        if let (Some(base), Some(id)) = (
            self.config.pipeline.trace_base_url.as_deref(),
            state.project_id(),
        ) {
            let url = format!("{}/{}", base.trim_end_matches('/'), id);
            state.set_trace_url(Some(url));
        }

        let outcome = if state.is_failed() {
            let error = state
                .messages()
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_else(|| "pipeline failed".to_string());
            RunOutcome::Failed { error }
        } else {
            state.set_status(RunStatus::Completed);
            let unresolved = state
                .validation_results()
                .is_some_and(|v| v.regeneration_needed)
                && state.regeneration_target().is_none();
            if unresolved {
                RunOutcome::Exhausted
            } else {
                RunOutcome::Completed
            }
        };

        let metrics = ctx.metrics().summary();
        info!(
            outcome = outcome.label(),
            files = state.generated_files().len(),
            regenerations = state.regeneration_count(),
            api_calls = metrics.api_calls,
            "Pipeline: Finished"
        );

        PipelineRun {
            state,
            outcome,
            metrics,
        }
    }

    /// Run the pipeline and return the project identity and trace link
    pub async fn process_document(&self, document: &Path) -> Result<(ProjectId, Option<String>)> {
        let run = self.run(document).await;
        if let RunOutcome::Failed { error } = &run.outcome {
            return Err(ForgeError::generation("pipeline", error.clone()));
        }
        let id = run
            .project_id()
            .cloned()
            .ok_or_else(|| ForgeError::State("run finished without a project".to_string()))?;
        Ok((id, run.trace_url().map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ScriptedProvider, ScriptedReply};
    use crate::pipeline::generators::templates;
    use crate::pipeline::prompts::roles;
    use crate::pipeline::state::RegenerationTarget;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;

    const DOCUMENT: &str = "Shop service.\nCustomers register and place orders.\n";

    const MODELS_REPLY: &str = "**app/models/order.py**\n```python\nclass Order(Base):\n    pass\n```\n";

    const ROUTES_REPLY: &str = "**orders.py**\n```python\nrouter = APIRouter()\n```\n";

    fn fenced(value: Value) -> ScriptedReply {
        ScriptedReply::text(format!("```json\n{}\n```", value))
    }

    fn approve() -> ScriptedReply {
        fenced(json!({"valid": true, "score": 88, "regeneration_needed": false}))
    }

    fn reject_routes() -> ScriptedReply {
        fenced(json!({
            "valid": false,
            "score": 45,
            "issues": ["routes lack validation"],
            "regeneration_needed": true,
            "regeneration_target": "generate_api_routes"
        }))
    }

    fn scripted_generation() -> Arc<ScriptedProvider> {
        let scripted = Arc::new(ScriptedProvider::new());
        scripted.always(
            roles::API_DESIGNER,
            fenced(json!({"endpoints": [{"method": "POST", "path": "/orders"}]})),
        );
        scripted.always(
            roles::DATABASE_ARCHITECT,
            fenced(json!({"tables": [{"name": "orders"}]})),
        );
        scripted.always(
            roles::BUSINESS_ANALYST,
            fenced(json!([{"rule": "an order needs at least one item"}])),
        );
        scripted.always(roles::SECURITY_ANALYST, fenced(json!({"methods": ["JWT"]})));
        scripted.always(roles::MODEL_DEVELOPER, ScriptedReply::text(MODELS_REPLY));
        scripted.always(roles::ROUTE_DEVELOPER, ScriptedReply::text(ROUTES_REPLY));
        scripted
    }

    struct Fixture {
        dir: TempDir,
        document: PathBuf,
        output: PathBuf,
    }

    fn fixture(file_name: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let document = dir.path().join(file_name);
        std::fs::write(&document, DOCUMENT).unwrap();
        let output = dir.path().join("out");
        Fixture {
            dir,
            document,
            output,
        }
    }

    fn pipeline(scripted: &Arc<ScriptedProvider>, output: &Path, max: u32) -> GenerationPipeline {
        let mut config = Config::default();
        config.pipeline.output_dir = output.to_path_buf();
        config.pipeline.max_regenerations = max;
        GenerationPipeline::new(scripted.clone(), config)
    }

    fn route_records(run: &PipelineRun) -> usize {
        run.state
            .generated_files()
            .iter()
            .filter(|f| f.path.ends_with("app/api/routes/orders.py"))
            .count()
    }

    #[tokio::test]
    async fn test_unsupported_extension_fails_immediately() {
        let fx = fixture("srs.pdf");
        let scripted = scripted_generation();
        let run = pipeline(&scripted, &fx.output, 3).run(&fx.document).await;

        assert!(matches!(run.outcome, RunOutcome::Failed { .. }));
        assert_eq!(run.state.status(), RunStatus::Failed);
        assert_eq!(run.state.messages().len(), 1);
        assert!(run.project_id().is_none());
        assert!(!fx.output.exists());
        assert!(scripted.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_pass_when_reviewer_approves() {
        let fx = fixture("srs.txt");
        let scripted = scripted_generation();
        scripted.on(roles::REVIEWER, approve());

        let run = pipeline(&scripted, &fx.output, 3).run(&fx.document).await;

        assert_eq!(run.outcome, RunOutcome::Completed);
        assert_eq!(run.state.status(), RunStatus::Completed);
        assert_eq!(run.state.regeneration_count(), 0);
        assert_eq!(scripted.calls_matching(roles::MODEL_DEVELOPER), 1);
        assert_eq!(scripted.calls_matching(roles::ROUTE_DEVELOPER), 1);
        assert_eq!(scripted.calls_matching(roles::REVIEWER), 1);
        assert_eq!(run.state.messages().len(), Stage::COUNT);
        // root + base/order models + route + 5 config + 2 main + 2 docs
        assert_eq!(run.state.generated_files().len(), 13);

        let root = run.project_path().unwrap();
        assert!(root.starts_with(&fx.output));
        assert!(root.join("app/models/order.py").is_file());
        assert!(root.join("app/api/routes/orders.py").is_file());
        assert_eq!(run.summary().score, Some(88));
        assert_eq!(run.metrics.api_calls, 7);
    }

    #[tokio::test]
    async fn test_route_regeneration_reruns_tail() {
        let fx = fixture("srs.md");
        let scripted = scripted_generation();
        scripted.on(roles::REVIEWER, reject_routes());
        scripted.on(roles::REVIEWER, reject_routes());
        scripted.on(roles::REVIEWER, approve());

        let run = pipeline(&scripted, &fx.output, 3).run(&fx.document).await;

        assert_eq!(run.outcome, RunOutcome::Completed);
        assert_eq!(run.state.regeneration_count(), 2);
        assert_eq!(scripted.calls_matching(roles::ROUTE_DEVELOPER), 3);
        assert_eq!(scripted.calls_matching(roles::MODEL_DEVELOPER), 1);
        assert_eq!(scripted.calls_matching(roles::REVIEWER), 3);
        assert_eq!(route_records(&run), 3);

        let root = run.project_path().unwrap();
        assert_eq!(
            std::fs::read_to_string(root.join("README.md")).unwrap(),
            templates::README
        );
        assert_eq!(
            std::fs::read_to_string(root.join("app/main.py")).unwrap(),
            templates::MAIN_PY
        );
        assert_eq!(
            std::fs::read_to_string(root.join("docs/workflow.md")).unwrap(),
            generators::render_workflow_doc()
        );
        let scaffolds = run
            .state
            .generated_files()
            .iter()
            .filter(|f| f.description == "Project root directory")
            .count();
        assert_eq!(scaffolds, 1);
    }

    #[tokio::test]
    async fn test_regeneration_ceiling_exhausts() {
        let fx = fixture("srs.txt");
        let scripted = scripted_generation();
        scripted.always(roles::REVIEWER, reject_routes());

        let run = pipeline(&scripted, &fx.output, 3).run(&fx.document).await;

        assert_eq!(run.outcome, RunOutcome::Exhausted);
        assert_eq!(run.state.status(), RunStatus::Completed);
        assert_eq!(run.state.regeneration_count(), 3);
        assert_eq!(run.state.regeneration_target(), None);
        assert_eq!(scripted.calls_matching(roles::ROUTE_DEVELOPER), 3);
        assert_eq!(route_records(&run), 3);
        assert_eq!(
            run.state.messages().last().unwrap().content,
            "Maximum regeneration attempts reached. Proceeding with current output."
        );
    }

    #[tokio::test]
    async fn test_invalid_target_regenerates_routes() {
        let fx = fixture("srs.txt");
        let scripted = scripted_generation();
        scripted.on(
            roles::REVIEWER,
            fenced(json!({"regeneration_needed": true, "regeneration_target": "generate_tests"})),
        );
        scripted.on(roles::REVIEWER, approve());

        let run = pipeline(&scripted, &fx.output, 3).run(&fx.document).await;

        assert_eq!(run.outcome, RunOutcome::Completed);
        assert_eq!(scripted.calls_matching(roles::ROUTE_DEVELOPER), 2);
        assert!(
            run.state
                .messages()
                .iter()
                .any(|m| m.content.starts_with("Invalid regeneration target 'generate_tests'"))
        );
        assert_eq!(
            RegenerationTarget::FALLBACK.stage(),
            Stage::GenRoutes
        );
    }

    #[tokio::test]
    async fn test_generator_failures_do_not_stop_run() {
        let fx = fixture("srs.txt");
        let scripted = Arc::new(ScriptedProvider::new());
        scripted.always(roles::API_DESIGNER, ScriptedReply::text("no json"));
        scripted.on(roles::REVIEWER, approve());

        let run = pipeline(&scripted, &fx.output, 3).run(&fx.document).await;

        assert_eq!(run.outcome, RunOutcome::Completed);
        assert!(run.state.api_endpoints().is_empty());
        let contents: Vec<&str> = run.state.messages().iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"Error: No database schema to generate models from"));
        assert!(contents.contains(&"Error: No API endpoints to generate routes from"));
        // root + 5 config + 2 main + 2 docs
        assert_eq!(run.state.generated_files().len(), 10);
    }

    #[tokio::test]
    async fn test_zero_budget_times_out() {
        let fx = fixture("srs.txt");
        let scripted = scripted_generation();
        let mut config = Config::default();
        config.pipeline.output_dir = fx.output.clone();
        config.pipeline.run_timeout_secs = 0;

        let run = GenerationPipeline::new(scripted.clone(), config)
            .run(&fx.document)
            .await;

        let RunOutcome::Failed { error } = &run.outcome else {
            panic!("expected failure");
        };
        assert!(error.contains("Timeout"));
        assert!(scripted.calls().is_empty());
    }

    #[tokio::test]
    async fn test_process_document_and_trace_url() {
        let fx = fixture("srs.txt");
        let scripted = scripted_generation();
        scripted.always(roles::REVIEWER, approve());
        let mut config = Config::default();
        config.pipeline.output_dir = fx.output.clone();
        config.pipeline.trace_base_url = Some("https://traces.example.com/runs/".to_string());
        let pipeline = GenerationPipeline::new(scripted, config);

        let (id, trace) = pipeline.process_document(&fx.document).await.unwrap();
        assert_eq!(
            trace.as_deref(),
            Some(format!("https://traces.example.com/runs/{}", id).as_str())
        );

        let missing = fx.dir.path().join("missing.docx");
        assert!(pipeline.process_document(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_runs_get_distinct_projects() {
        let fx = fixture("srs.txt");
        let scripted = scripted_generation();
        scripted.always(roles::REVIEWER, approve());
        let pipeline = pipeline(&scripted, &fx.output, 3);

        let (a, b) = tokio::join!(pipeline.run(&fx.document), pipeline.run(&fx.document));
        assert!(a.outcome.is_success() && b.outcome.is_success());
        assert_ne!(a.project_id(), b.project_id());
        assert_eq!(a.state.generated_files().len(), b.state.generated_files().len());
    }

    #[test]
    fn test_summary_serializes_outcome_tag() {
        let run = PipelineRun {
            state: PipelineState::new("srs.docx", 3),
            outcome: RunOutcome::Failed {
                error: "boom".to_string(),
            },
            metrics: crate::ai::MetricsCollector::new("r").summary(),
        };
        let value = serde_json::to_value(run.summary()).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["error"], "boom");
        assert_eq!(value["files_generated"], 0);
    }
}
