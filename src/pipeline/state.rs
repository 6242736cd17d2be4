//! Pipeline State
//!
//! The single record threaded through every stage. Fields are private so the
//! bookkeeping rules hold by construction:
//!
//! - project identity is assigned once and never changes
//! - the regeneration count only grows and never passes the ceiling
//! - the file ledger and the message trail are append-only

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ForgeError, ProjectId, Result};

/// One extracted requirement (endpoint, table, rule...) as returned by the model
pub type Record = serde_json::Value;

// =============================================================================
// Stages
// =============================================================================

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse = 1,
    Analyze = 2,
    Scaffold = 3,
    GenModels = 4,
    GenRoutes = 5,
    GenConfig = 6,
    GenMain = 7,
    GenDocs = 8,
    Validate = 9,
}

impl Stage {
    /// Total number of stages
    pub const COUNT: usize = 9;

    pub const ALL: [Stage; Self::COUNT] = [
        Self::Parse,
        Self::Analyze,
        Self::Scaffold,
        Self::GenModels,
        Self::GenRoutes,
        Self::GenConfig,
        Self::GenMain,
        Self::GenDocs,
        Self::Validate,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(stage: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_u8() == stage)
    }

    /// Machine name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Analyze => "analyze",
            Self::Scaffold => "scaffold",
            Self::GenModels => "gen_models",
            Self::GenRoutes => "gen_routes",
            Self::GenConfig => "gen_config",
            Self::GenMain => "gen_main",
            Self::GenDocs => "gen_docs",
            Self::Validate => "validate",
        }
    }

    /// Human-readable title
    pub fn title(&self) -> &'static str {
        match self {
            Self::Parse => "Parse Document",
            Self::Analyze => "Analyze Requirements",
            Self::Scaffold => "Generate Project Structure",
            Self::GenModels => "Generate Database Models",
            Self::GenRoutes => "Generate API Routes",
            Self::GenConfig => "Generate Configuration Files",
            Self::GenMain => "Generate Main Application",
            Self::GenDocs => "Generate Documentation",
            Self::Validate => "Validate Output",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Self::Parse => "Extract text content from the requirements document",
            Self::Analyze => {
                "Extract API endpoints, database schema, business logic, and authentication requirements"
            }
            Self::Scaffold => "Create the basic project directory structure",
            Self::GenModels => "Create SQLAlchemy models based on the database schema",
            Self::GenRoutes => "Create FastAPI routes based on the API endpoints",
            Self::GenConfig => {
                "Create configuration files like requirements.txt, Dockerfile, etc."
            }
            Self::GenMain => "Create the main FastAPI application file",
            Self::GenDocs => "Create documentation for the API and workflow",
            Self::Validate => "Review the generated project and decide whether to regenerate",
        }
    }

    /// Following stage on the forward path, `None` after validation
    pub fn next(&self) -> Option<Self> {
        Self::from_u8(self.as_u8() + 1)
    }

    pub fn is_generator(&self) -> bool {
        matches!(
            self,
            Self::GenModels | Self::GenRoutes | Self::GenConfig | Self::GenMain | Self::GenDocs
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Generator the reviewer may send the pipeline back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegenerationTarget {
    DatabaseModels,
    ApiRoutes,
    ConfigFiles,
    MainApplication,
    Documentation,
}

impl RegenerationTarget {
    pub const ALL: [RegenerationTarget; 5] = [
        Self::DatabaseModels,
        Self::ApiRoutes,
        Self::ConfigFiles,
        Self::MainApplication,
        Self::Documentation,
    ];

    /// Used when the reviewer names something unknown
    pub const FALLBACK: RegenerationTarget = Self::ApiRoutes;

    /// Name as it appears in reviewer verdicts
    pub fn name(&self) -> &'static str {
        match self {
            Self::DatabaseModels => "generate_database_models",
            Self::ApiRoutes => "generate_api_routes",
            Self::ConfigFiles => "generate_config_files",
            Self::MainApplication => "generate_main_application",
            Self::Documentation => "generate_documentation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name.trim())
    }

    /// Stage the controller jumps back to
    pub fn stage(&self) -> Stage {
        match self {
            Self::DatabaseModels => Stage::GenModels,
            Self::ApiRoutes => Stage::GenRoutes,
            Self::ConfigFiles => Stage::GenConfig,
            Self::MainApplication => Stage::GenMain,
            Self::Documentation => Stage::GenDocs,
        }
    }
}

impl fmt::Display for RegenerationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Initialized,
    Processing,
    Failed,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Processing => "processing",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Directory,
    File,
}

/// Ledger entry for one write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub description: String,
}

impl FileRecord {
    pub fn file(path: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::File,
            description: description.into(),
        }
    }

    pub fn directory(path: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::Directory,
            description: description.into(),
        }
    }
}

/// Reviewer verdict, with `score` already clamped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub score: u8,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub regeneration_needed: bool,
    /// Target exactly as the reviewer named it
    pub regeneration_target: Option<String>,
}

/// What the governor decided for a regeneration request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerationDecision {
    Scheduled { attempt: u32 },
    Exhausted { attempt: u32 },
}

// =============================================================================
// Pipeline State
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    source_path: PathBuf,
    source_text: Option<String>,
    api_endpoints: Vec<Record>,
    database_schema: Vec<Record>,
    business_logic: Vec<Record>,
    auth_requirements: Record,
    project_id: Option<ProjectId>,
    project_path: Option<PathBuf>,
    generated_files: Vec<FileRecord>,
    validation_results: Option<ValidationVerdict>,
    regeneration_count: u32,
    max_regenerations: u32,
    regeneration_target: Option<RegenerationTarget>,
    status: RunStatus,
    messages: Vec<Message>,
    trace_url: Option<String>,
}

impl PipelineState {
    pub fn new(source_path: impl Into<PathBuf>, max_regenerations: u32) -> Self {
        Self {
            source_path: source_path.into(),
            source_text: None,
            api_endpoints: Vec::new(),
            database_schema: Vec::new(),
            business_logic: Vec::new(),
            auth_requirements: Record::Object(Default::default()),
            project_id: None,
            project_path: None,
            generated_files: Vec::new(),
            validation_results: None,
            regeneration_count: 0,
            max_regenerations,
            regeneration_target: None,
            status: RunStatus::Initialized,
            messages: Vec::new(),
            trace_url: None,
        }
    }

    // ----- source -----

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn source_text(&self) -> Option<&str> {
        self.source_text.as_deref()
    }

    pub fn set_source_text(&mut self, text: String) -> Result<()> {
        if self.source_text.is_some() {
            return Err(ForgeError::State(
                "source text has already been ingested".to_string(),
            ));
        }
        self.source_text = Some(text);
        Ok(())
    }

    // ----- requirements -----

    pub fn api_endpoints(&self) -> &[Record] {
        &self.api_endpoints
    }

    pub fn set_api_endpoints(&mut self, records: Vec<Record>) {
        self.api_endpoints = records;
    }

    pub fn database_schema(&self) -> &[Record] {
        &self.database_schema
    }

    pub fn set_database_schema(&mut self, records: Vec<Record>) {
        self.database_schema = records;
    }

    pub fn business_logic(&self) -> &[Record] {
        &self.business_logic
    }

    pub fn set_business_logic(&mut self, records: Vec<Record>) {
        self.business_logic = records;
    }

    pub fn auth_requirements(&self) -> &Record {
        &self.auth_requirements
    }

    pub fn set_auth_requirements(&mut self, record: Record) {
        self.auth_requirements = record;
    }

    // ----- project identity -----

    pub fn project_id(&self) -> Option<&ProjectId> {
        self.project_id.as_ref()
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    /// Bind the run to its generated project; fails on a second call
    pub fn assign_project(&mut self, id: ProjectId, path: PathBuf) -> Result<()> {
        if let Some(existing) = &self.project_id {
            return Err(ForgeError::State(format!(
                "project already assigned ({})",
                existing
            )));
        }
        self.project_id = Some(id);
        self.project_path = Some(path);
        Ok(())
    }

    // ----- ledger -----

    pub fn generated_files(&self) -> &[FileRecord] {
        &self.generated_files
    }

    pub fn record_file(&mut self, record: FileRecord) {
        self.generated_files.push(record);
    }

    pub fn record_files(&mut self, records: impl IntoIterator<Item = FileRecord>) {
        self.generated_files.extend(records);
    }

    // ----- validation and regeneration -----

    pub fn validation_results(&self) -> Option<&ValidationVerdict> {
        self.validation_results.as_ref()
    }

    pub fn set_validation_results(&mut self, verdict: Option<ValidationVerdict>) {
        self.validation_results = verdict;
    }

    pub fn regeneration_count(&self) -> u32 {
        self.regeneration_count
    }

    pub fn max_regenerations(&self) -> u32 {
        self.max_regenerations
    }

    pub fn regeneration_target(&self) -> Option<RegenerationTarget> {
        self.regeneration_target
    }

    /// Count a regeneration request and schedule `target` unless the ceiling
    /// has been reached.
    pub fn request_regeneration(&mut self, target: RegenerationTarget) -> RegenerationDecision {
        if self.regeneration_count < self.max_regenerations {
            self.regeneration_count += 1;
        }
        let attempt = self.regeneration_count;

        if attempt >= self.max_regenerations {
            self.regeneration_target = None;
            RegenerationDecision::Exhausted { attempt }
        } else {
            self.regeneration_target = Some(target);
            RegenerationDecision::Scheduled { attempt }
        }
    }

    pub fn clear_regeneration_target(&mut self) {
        self.regeneration_target = None;
    }

    // ----- status, messages, trace -----

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn system_message(&mut self, content: impl Into<String>) {
        self.push_message(Role::System, content);
    }

    /// Record `content` and mark the run failed
    pub fn fail(&mut self, content: impl Into<String>) {
        self.system_message(content);
        self.status = RunStatus::Failed;
    }

    pub fn trace_url(&self) -> Option<&str> {
        self.trace_url.as_deref()
    }

    pub fn set_trace_url(&mut self, url: Option<String>) {
        self.trace_url = url;
    }
}
