use std::path::Path;

use async_trait::async_trait;

use super::{CodeGenerator, StageOutput, write_project_file};
use crate::constants::layout;
use crate::pipeline::context::StageContext;
use crate::pipeline::state::{FileRecord, PipelineState, Stage};
use crate::types::{Result, pretty_json};

/// API reference and pipeline description
pub struct DocsGenerator;

fn json_section(out: &mut String, title: &str, body: String) {
    out.push_str(&format!("## {}\n\n```json\n{}\n```\n\n", title, body));
}

/// `docs/api.md`: the extracted requirements, pretty printed
pub fn render_api_doc(state: &PipelineState) -> String {
    let mut out = String::from("# API Documentation\n\n");
    json_section(&mut out, "Endpoints", pretty_json(state.api_endpoints()));
    json_section(
        &mut out,
        "Authentication",
        pretty_json(state.auth_requirements()),
    );
    json_section(
        &mut out,
        "Database Schema",
        pretty_json(state.database_schema()),
    );
    json_section(&mut out, "Business Logic", pretty_json(state.business_logic()));
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

fn node_id(stage: Stage) -> char {
    (b'A' + stage.as_u8() - 1) as char
}

/// `docs/workflow.md`: stage diagram and descriptions
pub fn render_workflow_doc() -> String {
    let mut out = String::from("# Generation Pipeline\n\n```mermaid\ngraph TD\n");

    for stage in Stage::ALL {
        if let Some(next) = stage.next() {
            let from = if stage == Stage::Parse {
                format!("{}[{}]", node_id(stage), stage.title())
            } else {
                node_id(stage).to_string()
            };
            out.push_str(&format!(
                "    {} --> {}[{}]\n",
                from,
                node_id(next),
                next.title()
            ));
        }
    }
    for stage in Stage::ALL.into_iter().filter(Stage::is_generator) {
        out.push_str(&format!(
            "    {} -.->|regenerate| {}\n",
            node_id(Stage::Validate),
            node_id(stage)
        ));
    }
    out.push_str("```\n\n## Pipeline Stages\n\n");

    for (idx, stage) in Stage::ALL.iter().enumerate() {
        out.push_str(&format!(
            "{}. **{}**: {}\n",
            idx + 1,
            stage.title(),
            stage.summary()
        ));
    }
    out.push_str(
        "\nA regeneration jumps back to the named generator and re-runs every stage after it.\n",
    );
    out
}

#[async_trait]
impl CodeGenerator for DocsGenerator {
    fn stage(&self) -> Stage {
        Stage::GenDocs
    }

    fn subject(&self) -> &'static str {
        "documentation"
    }

    fn success_message(&self) -> &'static str {
        "Generated documentation for the FastAPI application"
    }

    async fn generate(
        &self,
        _ctx: &StageContext,
        state: &PipelineState,
        project_dir: &Path,
    ) -> Result<StageOutput> {
        let docs = Path::new(layout::DOCS_DIR);
        let api = write_project_file(project_dir, docs.join("api.md"), &render_api_doc(state))?;
        let workflow = write_project_file(
            project_dir,
            docs.join("workflow.md"),
            &render_workflow_doc(),
        )?;
        Ok(StageOutput::Produced(vec![
            FileRecord::file(api, "API documentation"),
            FileRecord::file(workflow, "Pipeline workflow documentation"),
        ]))
    }
}
