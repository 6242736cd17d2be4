//! Output Validation
//!
//! A reviewer model grades the generated project against the extracted
//! requirements and may ask for one generator to run again. The request goes
//! through the regeneration governor on [`PipelineState`]; reviewer failures
//! are treated as "no regeneration".

use serde_json::Value;
use tracing::{info, warn};

use super::blocks::extract_json_block;
use super::context::StageContext;
use super::prompts::{self, ReviewInput};
use super::state::{PipelineState, RegenerationDecision, RegenerationTarget, ValidationVerdict};
use crate::constants::pipeline as pipeline_constants;
use crate::types::{
    ForgeError, Result, json_bool, json_i64, json_string, json_string_array, pretty_json,
};

/// Read a verdict object, clamping the score to 0..=100
pub fn parse_verdict(value: &Value) -> ValidationVerdict {
    let score = json_i64(value, "score", 0).clamp(0, pipeline_constants::MAX_SCORE);
    ValidationVerdict {
        valid: json_bool(value, "valid", false),
        score: u8::try_from(score).unwrap_or(u8::MAX),
        issues: json_string_array(value, "issues"),
        recommendations: json_string_array(value, "recommendations"),
        regeneration_needed: json_bool(value, "regeneration_needed", false),
        regeneration_target: json_string(value, "regeneration_target"),
    }
}

async fn review(ctx: &StageContext, state: &PipelineState) -> Result<ValidationVerdict> {
    let valid_targets: Vec<&str> = RegenerationTarget::ALL.iter().map(|t| t.name()).collect();
    let prompt = prompts::validation(&ReviewInput {
        endpoints: &pretty_json(state.api_endpoints()),
        schema: &pretty_json(state.database_schema()),
        logic: &pretty_json(state.business_logic()),
        auth: &pretty_json(state.auth_requirements()),
        files: &pretty_json(state.generated_files()),
        valid_targets: &valid_targets,
    });

    let reply = ctx.ask_reviewer(&prompt).await?;
    let value = extract_json_block(&reply).map_err(|e| ForgeError::LlmApi(e.to_string()))?;
    if !value.is_object() {
        return Err(ForgeError::LlmApi(
            "Reviewer verdict is not a JSON object".to_string(),
        ));
    }
    Ok(parse_verdict(&value))
}

/// Validate stage
pub async fn run(ctx: &StageContext, mut state: PipelineState) -> PipelineState {
    let verdict = match review(ctx, &state).await {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!("Validation failed open: {}", e);
            state.set_validation_results(None);
            state.clear_regeneration_target();
            state.system_message(format!("Error validating output: {}", e));
            return state;
        }
    };

    info!(
        valid = verdict.valid,
        score = verdict.score,
        issues = verdict.issues.len(),
        regeneration_needed = verdict.regeneration_needed,
        "Reviewer verdict"
    );

    let needed = verdict.regeneration_needed;
    let requested = verdict.regeneration_target.clone();
    state.set_validation_results(Some(verdict));

    if !needed {
        state.clear_regeneration_target();
        state.system_message("Validation successful. Project generated successfully.");
        return state;
    }

    let target = match requested.as_deref().and_then(RegenerationTarget::from_name) {
        Some(target) => target,
        None => {
            let shown = requested.as_deref().unwrap_or("None");
            let fallback = RegenerationTarget::FALLBACK;
            warn!(
                "Reviewer named invalid target '{}', using '{}'",
                shown, fallback
            );
            state.system_message(format!(
                "Invalid regeneration target '{}'. Defaulting to '{}'.",
                shown, fallback
            ));
            fallback
        }
    };

    let max = state.max_regenerations();
    match state.request_regeneration(target) {
        RegenerationDecision::Scheduled { attempt } => {
            state.system_message(format!(
                "Validation failed. Regenerating {}. Attempt {} of {}.",
                target, attempt, max
            ));
        }
        RegenerationDecision::Exhausted { attempt } => {
            warn!("Regeneration ceiling of {} reached, {} not regenerated", max, target);
            state.system_message(format!(
                "Validation failed. Regeneration limit reached ({} of {}); {} will not be regenerated.",
                attempt, max, target
            ));
            state.system_message(
                "Maximum regeneration attempts reached. Proceeding with current output.",
            );
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ScriptedProvider, ScriptedReply};
    use crate::config::Config;
    use crate::pipeline::prompts::roles;
    use serde_json::json;
    use std::sync::Arc;

    fn verdict_reply(value: Value) -> ScriptedReply {
        ScriptedReply::text(format!("```json\n{}\n```", value))
    }

    fn ctx_with(replies: Vec<ScriptedReply>) -> (StageContext, Arc<ScriptedProvider>) {
        let scripted = Arc::new(ScriptedProvider::new());
        for reply in replies {
            scripted.on(roles::REVIEWER, reply);
        }
        (StageContext::new(scripted.clone(), &Config::default()), scripted)
    }

    #[test]
    fn test_parse_verdict_clamps_score() {
        let verdict = parse_verdict(&json!({"valid": true, "score": 250, "issues": ["a", {"b": 1}]}));
        assert_eq!(verdict.score, 100);
        assert_eq!(verdict.issues, vec!["a".to_string(), "{\"b\":1}".to_string()]);
        assert_eq!(parse_verdict(&json!({"score": -5})).score, 0);
        assert_eq!(parse_verdict(&json!({"score": 72.9})).score, 72);
        assert!(!parse_verdict(&json!({})).regeneration_needed);
    }

    #[tokio::test]
    async fn test_successful_validation() {
        let (ctx, scripted) = ctx_with(vec![verdict_reply(
            json!({"valid": true, "score": 91, "regeneration_needed": false}),
        )]);
        let state = run(&ctx, PipelineState::new("srs.docx", 3)).await;

        assert_eq!(state.validation_results().unwrap().score, 91);
        assert_eq!(state.regeneration_target(), None);
        assert_eq!(
            state.messages().last().unwrap().content,
            "Validation successful. Project generated successfully."
        );
        assert_eq!(scripted.calls()[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_invalid_target_defaults_to_routes() {
        let (ctx, _) = ctx_with(vec![verdict_reply(json!({
            "valid": false,
            "score": 40,
            "regeneration_needed": true,
            "regeneration_target": "generate_tests"
        }))]);
        let state = run(&ctx, PipelineState::new("srs.docx", 3)).await;

        assert_eq!(state.regeneration_target(), Some(RegenerationTarget::ApiRoutes));
        assert_eq!(state.regeneration_count(), 1);
        let contents: Vec<&str> = state.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Invalid regeneration target 'generate_tests'. Defaulting to 'generate_api_routes'.",
                "Validation failed. Regenerating generate_api_routes. Attempt 1 of 3.",
            ]
        );
    }

    #[tokio::test]
    async fn test_named_target_is_scheduled() {
        let (ctx, _) = ctx_with(vec![verdict_reply(json!({
            "regeneration_needed": true,
            "regeneration_target": "generate_database_models"
        }))]);
        let state = run(&ctx, PipelineState::new("srs.docx", 3)).await;
        assert_eq!(
            state.regeneration_target(),
            Some(RegenerationTarget::DatabaseModels)
        );
    }

    #[tokio::test]
    async fn test_ceiling_forces_no_target() {
        let (ctx, _) = ctx_with(vec![verdict_reply(json!({
            "regeneration_needed": true,
            "regeneration_target": "generate_api_routes"
        }))]);
        let state = run(&ctx, PipelineState::new("srs.docx", 1)).await;

        assert_eq!(state.regeneration_count(), 1);
        assert_eq!(state.regeneration_target(), None);
        assert_eq!(
            state.messages().last().unwrap().content,
            "Maximum regeneration attempts reached. Proceeding with current output."
        );
    }

    #[tokio::test]
    async fn test_zero_ceiling_never_announces_regeneration() {
        let (ctx, _) = ctx_with(vec![verdict_reply(json!({
            "regeneration_needed": true,
            "regeneration_target": "generate_database_models"
        }))]);
        let state = run(&ctx, PipelineState::new("srs.docx", 0)).await;

        assert_eq!(state.regeneration_count(), 0);
        assert_eq!(state.regeneration_target(), None);
        let contents: Vec<&str> = state.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Validation failed. Regeneration limit reached (0 of 0); generate_database_models will not be regenerated.",
                "Maximum regeneration attempts reached. Proceeding with current output.",
            ]
        );
        assert!(contents.iter().all(|c| !c.contains("Regenerating")));
    }

    #[tokio::test]
    async fn test_reviewer_failure_fails_open() {
        let (ctx, _) = ctx_with(vec![ScriptedReply::text("looks fine to me")]);
        let state = run(&ctx, PipelineState::new("srs.docx", 3)).await;

        assert!(state.validation_results().is_none());
        assert_eq!(state.regeneration_target(), None);
        assert_eq!(state.regeneration_count(), 0);
        assert!(state.messages()[0].content.starts_with("Error validating output:"));
        assert!(!state.is_failed());
    }
}
