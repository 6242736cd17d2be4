use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use super::{CodeGenerator, StageOutput, write_project_file};
use crate::constants::layout;
use crate::pipeline::blocks::{parse_labeled_blocks, sanitize_relative_path};
use crate::pipeline::context::StageContext;
use crate::pipeline::prompts;
use crate::pipeline::state::{FileRecord, PipelineState, Stage};
use crate::types::{Result, pretty_json};

/// FastAPI route modules from the extracted endpoints
pub struct RoutesGenerator;

/// Path of a route file relative to the routes package
///
/// Labels may or may not repeat the package prefix; either way the result
/// never nests `app/api/routes` inside itself.
fn route_path(label: &str) -> Option<PathBuf> {
    let path = sanitize_relative_path(label)?;
    if path.extension().and_then(|e| e.to_str()) != Some("py") {
        return None;
    }
    let relative = path
        .strip_prefix(layout::ROUTES_DIR)
        .map(Path::to_path_buf)
        .unwrap_or(path);
    (!relative.as_os_str().is_empty()).then_some(relative)
}

#[async_trait]
impl CodeGenerator for RoutesGenerator {
    fn stage(&self) -> Stage {
        Stage::GenRoutes
    }

    fn subject(&self) -> &'static str {
        "API routes"
    }

    fn success_message(&self) -> &'static str {
        "Generated API routes based on the extracted endpoints"
    }

    async fn generate(
        &self,
        ctx: &StageContext,
        state: &PipelineState,
        project_dir: &Path,
    ) -> Result<StageOutput> {
        if state.api_endpoints().is_empty() {
            return Ok(StageOutput::Issue(
                "Error: No API endpoints to generate routes from".to_string(),
            ));
        }

        let prompt = prompts::api_routes(
            &pretty_json(state.api_endpoints()),
            &pretty_json(state.database_schema()),
            &pretty_json(state.business_logic()),
            &pretty_json(state.auth_requirements()),
        );
        let reply = ctx.ask(self.stage(), &prompt).await?;

        let mut records = Vec::new();
        for block in parse_labeled_blocks(&reply) {
            let Some(relative) = route_path(&block.label) else {
                warn!("Skipping route block with label '{}'", block.label);
                continue;
            };
            let path = write_project_file(
                project_dir,
                Path::new(layout::ROUTES_DIR).join(&relative),
                &block.file_contents(),
            )?;
            records.push(FileRecord::file(
                path,
                format!("{} FastAPI routes", relative.display()),
            ));
        }

        if records.is_empty() {
            warn!("Route reply contained no labeled .py blocks");
        }
        Ok(StageOutput::Produced(records))
    }
}
