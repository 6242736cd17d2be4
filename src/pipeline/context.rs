//! Stage Context
//!
//! Immutable handles shared by every stage of one run: the provider, call
//! timeouts, sampling temperatures and the metrics collector.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::state::Stage;
use crate::ai::{
    GenerateOptions, MetricsCollector, SharedMetrics, SharedProvider, TimeoutConfig, with_timeout,
};
use crate::config::Config;
use crate::types::Result;

#[derive(Clone)]
pub struct StageContext {
    provider: SharedProvider,
    metrics: SharedMetrics,
    timeouts: TimeoutConfig,
    temperature: f32,
    validation_temperature: f32,
    output_root: PathBuf,
    concurrent_extraction: bool,
}

impl StageContext {
    pub fn new(provider: SharedProvider, config: &Config) -> Self {
        Self {
            provider,
            metrics: Arc::new(MetricsCollector::new(uuid::Uuid::new_v4().to_string())),
            timeouts: TimeoutConfig::from_config(config),
            temperature: config.llm.temperature,
            validation_temperature: config.llm.validation_temperature,
            output_root: config.pipeline.output_dir.clone(),
            concurrent_extraction: config.pipeline.concurrent_extraction,
        }
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn concurrent_extraction(&self) -> bool {
        self.concurrent_extraction
    }

    /// Call the model at the generation temperature
    pub async fn ask(&self, stage: Stage, prompt: &str) -> Result<String> {
        self.ask_with(stage, prompt, GenerateOptions::with_temperature(self.temperature))
            .await
    }

    /// Call the model at the reviewer temperature
    pub async fn ask_reviewer(&self, prompt: &str) -> Result<String> {
        self.ask_with(
            Stage::Validate,
            prompt,
            GenerateOptions::with_temperature(self.validation_temperature),
        )
        .await
    }

    async fn ask_with(
        &self,
        stage: Stage,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<String> {
        debug!(
            stage = stage.name(),
            provider = self.provider.name(),
            "Prompt: {} chars",
            prompt.len()
        );

        let result = with_timeout(
            self.timeouts.llm_request,
            self.provider.generate(prompt, &options),
            &format!("{} model call", stage.name()),
        )
        .await;

        match result {
            Ok(response) => {
                self.metrics.record_response(stage.name(), &response);
                debug!(
                    stage = stage.name(),
                    "Reply: {} chars, {} tokens",
                    response.content.len(),
                    response.usage.total()
                );
                Ok(response.content)
            }
            Err(e) => {
                self.metrics.record_failure(stage.name());
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("timeouts", &self.timeouts)
            .field("temperature", &self.temperature)
            .field("validation_temperature", &self.validation_temperature)
            .field("output_root", &self.output_root)
            .field("concurrent_extraction", &self.concurrent_extraction)
            .finish()
    }
}
