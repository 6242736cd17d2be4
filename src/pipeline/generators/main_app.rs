use std::path::Path;

use async_trait::async_trait;

use super::{CodeGenerator, StageOutput, templates, write_project_file};
use crate::pipeline::context::StageContext;
use crate::pipeline::state::{FileRecord, PipelineState, Stage};
use crate::types::Result;

/// Application entry point and database service
pub struct MainAppGenerator;

#[async_trait]
impl CodeGenerator for MainAppGenerator {
    fn stage(&self) -> Stage {
        Stage::GenMain
    }

    fn subject(&self) -> &'static str {
        "main application"
    }

    fn success_message(&self) -> &'static str {
        "Generated main FastAPI application file"
    }

    async fn generate(
        &self,
        _ctx: &StageContext,
        _state: &PipelineState,
        project_dir: &Path,
    ) -> Result<StageOutput> {
        let main = write_project_file(project_dir, "app/main.py", templates::MAIN_PY)?;
        let database = write_project_file(
            project_dir,
            "app/services/database.py",
            templates::DATABASE_PY,
        )?;
        Ok(StageOutput::Produced(vec![
            FileRecord::file(main, "Main FastAPI application"),
            FileRecord::file(database, "Database service"),
        ]))
    }
}
