use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

use super::{CodeGenerator, StageOutput, templates, write_project_file};
use crate::constants::layout;
use crate::pipeline::blocks::{parse_labeled_blocks, sanitize_relative_path};
use crate::pipeline::context::StageContext;
use crate::pipeline::prompts;
use crate::pipeline::state::{FileRecord, PipelineState, Stage};
use crate::types::{Result, pretty_json};

/// SQLAlchemy models from the extracted schema
pub struct ModelsGenerator;

/// `app/models/<name>.py` labels yield `<name>`
fn model_name(label: &str) -> Option<String> {
    let path = sanitize_relative_path(label)?;
    let file = path.strip_prefix(layout::MODELS_DIR).ok()?;
    if file.components().count() != 1 {
        return None;
    }
    let name = file.to_str()?.strip_suffix(".py")?;
    (!name.is_empty()).then(|| name.to_string())
}

#[async_trait]
impl CodeGenerator for ModelsGenerator {
    fn stage(&self) -> Stage {
        Stage::GenModels
    }

    fn subject(&self) -> &'static str {
        "database models"
    }

    fn success_message(&self) -> &'static str {
        "Generated database models based on the extracted schema"
    }

    async fn generate(
        &self,
        ctx: &StageContext,
        state: &PipelineState,
        project_dir: &Path,
    ) -> Result<StageOutput> {
        if state.database_schema().is_empty() {
            return Ok(StageOutput::Issue(
                "Error: No database schema to generate models from".to_string(),
            ));
        }

        let prompt = prompts::database_models(&pretty_json(state.database_schema()));
        let reply = ctx.ask(self.stage(), &prompt).await?;

        let base = write_project_file(
            project_dir,
            Path::new(layout::MODELS_DIR).join("base.py"),
            templates::BASE_MODEL,
        )?;
        let mut records = vec![FileRecord::file(base, "Base model with timestamp mixin")];

        for block in parse_labeled_blocks(&reply) {
            let Some(name) = model_name(&block.label) else {
                warn!("Skipping model block with label '{}'", block.label);
                continue;
            };
            if name == "base" {
                warn!("Ignoring model block that would replace base.py");
                continue;
            }
            let path = write_project_file(
                project_dir,
                Path::new(layout::MODELS_DIR).join(format!("{}.py", name)),
                &block.file_contents(),
            )?;
            records.push(FileRecord::file(path, format!("{}.py SQLAlchemy model", name)));
        }

        if records.len() == 1 {
            warn!("Model reply contained no app/models/<name>.py blocks");
        }
        Ok(StageOutput::Produced(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ScriptedProvider, ScriptedReply};
    use crate::config::Config;
    use crate::types::ProjectId;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    const REPLY: &str = "\
**app/models/user.py**
```python
class User(Base):
    __tablename__ = \"users\"
```

**app/api/routes/users.py**
```python
router = None
```

**app/models/../../escape.py**
```python
bad = True
```
";

    fn state_with_schema(dir: &Path) -> PipelineState {
        let mut state = PipelineState::new("srs.docx", 3);
        state
            .assign_project(ProjectId::new("p"), dir.to_path_buf())
            .unwrap();
        state.set_database_schema(vec![json!({"name": "users"})]);
        state
    }

    #[test]
    fn test_model_name() {
        assert_eq!(model_name("app/models/user.py").as_deref(), Some("user"));
        assert_eq!(model_name("app/models/nested/x.py"), None);
        assert_eq!(model_name("user.py"), None);
        assert_eq!(model_name("app/models/readme.md"), None);
    }

    #[tokio::test]
    async fn test_generates_base_and_labeled_models() {
        let dir = TempDir::new().unwrap();
        let scripted = Arc::new(ScriptedProvider::new());
        scripted.on(prompts::roles::MODEL_DEVELOPER, ScriptedReply::text(REPLY));
        let ctx = StageContext::new(scripted.clone(), &Config::default());

        let output = ModelsGenerator
            .generate(&ctx, &state_with_schema(dir.path()), dir.path())
            .await
            .unwrap();

        let StageOutput::Produced(records) = output else {
            panic!("expected produced files");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "Base model with timestamp mixin");
        assert_eq!(records[1].description, "user.py SQLAlchemy model");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app/models/user.py")).unwrap(),
            "class User(Base):\n    __tablename__ = \"users\"\n"
        );
        assert!(!dir.path().join("app/api/routes/users.py").exists());
        assert!(scripted.calls()[0].prompt.contains("\"name\": \"users\""));
    }

    #[tokio::test]
    async fn test_empty_schema_is_issue_without_call() {
        let dir = TempDir::new().unwrap();
        let scripted = Arc::new(ScriptedProvider::new());
        let ctx = StageContext::new(scripted.clone(), &Config::default());
        let mut state = state_with_schema(dir.path());
        state.set_database_schema(Vec::new());

        let output = ModelsGenerator
            .generate(&ctx, &state, dir.path())
            .await
            .unwrap();
        assert!(matches!(output, StageOutput::Issue(_)));
        assert!(scripted.calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_call_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let scripted = Arc::new(ScriptedProvider::new());
        let ctx = StageContext::new(scripted, &Config::default());

        let result = ModelsGenerator
            .generate(&ctx, &state_with_schema(dir.path()), dir.path())
            .await;
        assert!(result.is_err());
        assert!(!dir.path().join("app/models/base.py").exists());
    }
}
