use std::path::Path;

use async_trait::async_trait;

use super::{CodeGenerator, StageOutput, templates, write_project_file};
use crate::pipeline::context::StageContext;
use crate::pipeline::state::{FileRecord, PipelineState, Stage};
use crate::types::Result;

/// Dependency, environment, container and readme files
pub struct ConfigGenerator;

const FILES: &[(&str, &str, &str)] = &[
    ("requirements.txt", templates::REQUIREMENTS_TXT, "Project dependencies"),
    (".env.example", templates::ENV_EXAMPLE, "Environment variables example"),
    ("Dockerfile", templates::DOCKERFILE, "Docker configuration"),
    (
        "docker-compose.yml",
        templates::DOCKER_COMPOSE,
        "Docker Compose configuration",
    ),
    ("README.md", templates::README, "Project documentation"),
];

#[async_trait]
impl CodeGenerator for ConfigGenerator {
    fn stage(&self) -> Stage {
        Stage::GenConfig
    }

    fn subject(&self) -> &'static str {
        "configuration files"
    }

    fn success_message(&self) -> &'static str {
        "Generated configuration files for the FastAPI application"
    }

    async fn generate(
        &self,
        _ctx: &StageContext,
        _state: &PipelineState,
        project_dir: &Path,
    ) -> Result<StageOutput> {
        let mut records = Vec::with_capacity(FILES.len());
        for (name, contents, description) in FILES {
            let path = write_project_file(project_dir, name, contents)?;
            records.push(FileRecord::file(path, *description));
        }
        Ok(StageOutput::Produced(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ScriptedProvider;
    use crate::config::Config;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_all_config_files() {
        let dir = TempDir::new().unwrap();
        let scripted = Arc::new(ScriptedProvider::new());
        let ctx = StageContext::new(scripted.clone(), &Config::default());
        let state = PipelineState::new("srs.docx", 3);

        let StageOutput::Produced(records) = ConfigGenerator
            .generate(&ctx, &state, dir.path())
            .await
            .unwrap()
        else {
            panic!("expected produced files");
        };

        let names: Vec<_> = records
            .iter()
            .map(|r| r.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "requirements.txt",
                ".env.example",
                "Dockerfile",
                "docker-compose.yml",
                "README.md"
            ]
        );
        assert!(
            std::fs::read_to_string(dir.path().join("requirements.txt"))
                .unwrap()
                .contains("fastapi>=0.104.0")
        );
        assert!(scripted.calls().is_empty());
    }
}
