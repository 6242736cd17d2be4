//! Requirements Extraction
//!
//! Four independent model queries pull structured requirements out of the
//! document text: API endpoints, database schema, business logic and
//! authentication requirements.
//!
//! Sub-calls run in order by default and the first failure stops the rest.
//! With concurrent extraction enabled all four are issued together and each
//! success is kept. Either way fields that were populated stay populated.

use serde_json::Value;
use tracing::{info, warn};

use super::blocks::extract_json_block;
use super::context::StageContext;
use super::prompts;
use super::state::{PipelineState, Record, Role, RunStatus, Stage};
use crate::types::{ForgeError, Result};

/// One extraction sub-call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    ApiEndpoints,
    DatabaseSchema,
    BusinessLogic,
    AuthRequirements,
}

impl Artifact {
    /// Sequential issue order
    pub const ALL: [Artifact; 4] = [
        Self::ApiEndpoints,
        Self::DatabaseSchema,
        Self::BusinessLogic,
        Self::AuthRequirements,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ApiEndpoints => "API endpoints",
            Self::DatabaseSchema => "database schema",
            Self::BusinessLogic => "business logic",
            Self::AuthRequirements => "authentication requirements",
        }
    }

    fn prompt(&self, document: &str) -> String {
        match self {
            Self::ApiEndpoints => prompts::api_endpoints(document),
            Self::DatabaseSchema => prompts::database_schema(document),
            Self::BusinessLogic => prompts::business_logic(document),
            Self::AuthRequirements => prompts::auth_requirements(document),
        }
    }
}

/// Coerce a parsed reply into a record list
///
/// Arrays are taken as-is. An object whose only member is an array
/// (`{"endpoints": [...]}`) is unwrapped to that array. Any other value,
/// including an object with sibling members, becomes a one-element list.
pub fn normalize_records(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) if map.len() == 1 && map.values().all(Value::is_array) => map
            .into_iter()
            .flat_map(|(_, v)| match v {
                Value::Array(items) => items,
                other => vec![other],
            })
            .collect(),
        Value::Object(map) => vec![Value::Object(map)],
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

async fn extract_one(ctx: &StageContext, artifact: Artifact, document: &str) -> Result<Value> {
    let reply = ctx
        .ask(Stage::Analyze, &artifact.prompt(document))
        .await
        .map_err(|e| ForgeError::extraction(artifact.name(), e.to_string()))?;
    extract_json_block(&reply).map_err(|e| ForgeError::extraction(artifact.name(), e.to_string()))
}

fn apply(state: &mut PipelineState, artifact: Artifact, value: Value) {
    match artifact {
        Artifact::ApiEndpoints => state.set_api_endpoints(normalize_records(value)),
        Artifact::DatabaseSchema => state.set_database_schema(normalize_records(value)),
        Artifact::BusinessLogic => state.set_business_logic(normalize_records(value)),
        Artifact::AuthRequirements => state.set_auth_requirements(value),
    }
}

async fn run_sequential(
    ctx: &StageContext,
    state: &mut PipelineState,
    document: &str,
) -> Vec<ForgeError> {
    for artifact in Artifact::ALL {
        match extract_one(ctx, artifact, document).await {
            Ok(value) => apply(state, artifact, value),
            Err(e) => return vec![e],
        }
    }
    Vec::new()
}

async fn run_concurrent(
    ctx: &StageContext,
    state: &mut PipelineState,
    document: &str,
) -> Vec<ForgeError> {
    let (endpoints, schema, logic, auth) = tokio::join!(
        extract_one(ctx, Artifact::ApiEndpoints, document),
        extract_one(ctx, Artifact::DatabaseSchema, document),
        extract_one(ctx, Artifact::BusinessLogic, document),
        extract_one(ctx, Artifact::AuthRequirements, document),
    );

    let mut failures = Vec::new();
    for (artifact, result) in Artifact::ALL
        .into_iter()
        .zip([endpoints, schema, logic, auth])
    {
        match result {
            Ok(value) => apply(state, artifact, value),
            Err(e) => failures.push(e),
        }
    }
    failures
}

/// Analyze stage
pub async fn run(ctx: &StageContext, mut state: PipelineState) -> PipelineState {
    let Some(document) = state.source_text().map(str::to_owned) else {
        warn!("No document text to analyze");
        state.push_message(Role::User, "Error: No requirements document to analyze");
        state.set_status(RunStatus::Failed);
        return state;
    };

    let failures = if ctx.concurrent_extraction() {
        run_concurrent(ctx, &mut state, &document).await
    } else {
        run_sequential(ctx, &mut state, &document).await
    };

    if failures.is_empty() {
        info!(
            endpoints = state.api_endpoints().len(),
            tables = state.database_schema().len(),
            rules = state.business_logic().len(),
            "Requirements extracted"
        );
        state.system_message("Successfully analyzed requirements document and extracted requirements");
    } else {
        let detail = failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        warn!("Requirements extraction incomplete: {}", detail);
        state.system_message(format!("Error analyzing requirements: {}", detail));
    }
    state
}
