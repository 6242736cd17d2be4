//! Code Generators
//!
//! One generator per output group. Each returns either the ledger entries
//! for the files it wrote or an issue describing why it wrote nothing; the
//! controller records the outcome and always moves on.
//!
//! | Stage        | Generator                | Model call |
//! |--------------|--------------------------|------------|
//! | `gen_models` | [`ModelsGenerator`]      | yes        |
//! | `gen_routes` | [`RoutesGenerator`]      | yes        |
//! | `gen_config` | [`ConfigGenerator`]      | no         |
//! | `gen_main`   | [`MainAppGenerator`]     | no         |
//! | `gen_docs`   | [`DocsGenerator`]        | no         |

mod config;
mod docs;
mod main_app;
mod models;
mod routes;
pub mod templates;

pub use config::ConfigGenerator;
pub use docs::{DocsGenerator, render_api_doc, render_workflow_doc};
pub use main_app::MainAppGenerator;
pub use models::ModelsGenerator;
pub use routes::RoutesGenerator;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use super::context::StageContext;
use super::state::{FileRecord, PipelineState, Stage};
use crate::types::{ForgeError, Result};

/// What a generator pass produced
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// Files written, in write order
    Produced(Vec<FileRecord>),
    /// Nothing written; the message goes to the audit trail
    Issue(String),
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    fn stage(&self) -> Stage;

    /// Noun phrase for error messages ("database models")
    fn subject(&self) -> &'static str;

    /// Audit message recorded on success
    fn success_message(&self) -> &'static str;

    async fn generate(
        &self,
        ctx: &StageContext,
        state: &PipelineState,
        project_dir: &Path,
    ) -> Result<StageOutput>;
}

/// Generator responsible for `stage`
pub fn for_stage(stage: Stage) -> Option<Box<dyn CodeGenerator>> {
    match stage {
        Stage::GenModels => Some(Box::new(ModelsGenerator)),
        Stage::GenRoutes => Some(Box::new(RoutesGenerator)),
        Stage::GenConfig => Some(Box::new(ConfigGenerator)),
        Stage::GenMain => Some(Box::new(MainAppGenerator)),
        Stage::GenDocs => Some(Box::new(DocsGenerator)),
        _ => None,
    }
}

/// Run one generator and fold its outcome into the state
pub async fn run(
    generator: &dyn CodeGenerator,
    ctx: &StageContext,
    mut state: PipelineState,
) -> PipelineState {
    let Some(project_dir) = state.project_path().map(Path::to_path_buf) else {
        let err = ForgeError::State(format!(
            "{} ran before the project was scaffolded",
            generator.stage()
        ));
        warn!("{}", err);
        state.fail(format!("Error generating {}: {}", generator.subject(), err));
        return state;
    };

    match generator.generate(ctx, &state, &project_dir).await {
        Ok(StageOutput::Produced(records)) => {
            info!(
                stage = generator.stage().name(),
                files = records.len(),
                "Generated {}",
                generator.subject()
            );
            state.record_files(records);
            state.system_message(generator.success_message());
        }
        Ok(StageOutput::Issue(message)) => {
            warn!(stage = generator.stage().name(), "{}", message);
            state.system_message(message);
        }
        Err(e) => {
            warn!(
                stage = generator.stage().name(),
                "Generating {} failed: {}",
                generator.subject(),
                e
            );
            state.system_message(format!("Error generating {}: {}", generator.subject(), e));
        }
    }
    state
}

/// Write `contents` to `project_dir/relative`, creating parent directories
pub(crate) fn write_project_file(
    project_dir: &Path,
    relative: impl AsRef<Path>,
    contents: &str,
) -> Result<PathBuf> {
    let path = project_dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ScriptedProvider;
    use crate::config::Config;
    use crate::types::ProjectId;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_every_generator_stage_has_generator() {
        for stage in Stage::ALL {
            let generator = for_stage(stage);
            assert_eq!(generator.is_some(), stage.is_generator());
            if let Some(generator) = generator {
                assert_eq!(generator.stage(), stage);
            }
        }
    }

    #[test]
    fn test_write_project_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = write_project_file(dir.path(), "docs/nested/a.md", "x").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x");
    }

    #[tokio::test]
    async fn test_run_without_project_fails() {
        let ctx = StageContext::new(Arc::new(ScriptedProvider::new()), &Config::default());
        let state = run(&ConfigGenerator, &ctx, PipelineState::new("srs.docx", 3)).await;
        assert!(state.is_failed());
        assert!(state.generated_files().is_empty());
    }

    #[tokio::test]
    async fn test_run_records_produced_files() {
        let dir = TempDir::new().unwrap();
        let ctx = StageContext::new(Arc::new(ScriptedProvider::new()), &Config::default());
        let mut state = PipelineState::new("srs.docx", 3);
        state
            .assign_project(ProjectId::new("p"), dir.path().to_path_buf())
            .unwrap();

        let state = run(&MainAppGenerator, &ctx, state).await;
        assert_eq!(state.generated_files().len(), 2);
        assert_eq!(
            state.messages().last().unwrap().content,
            MainAppGenerator.success_message()
        );
    }
}
