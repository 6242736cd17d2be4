//! Pipeline Metrics Collection
//!
//! Aggregates LLM call counts, token usage and latency per pipeline stage.
//! Thread-safe so concurrent extraction calls can record into one collector.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = MetricsCollector::new(project_id);
//! metrics.record_response("analyze", &response);
//! let summary = metrics.summary();
//! ```

use crate::ai::provider::LlmResponse;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Thread-safe metrics collector for one pipeline run.
pub struct MetricsCollector {
    run_id: String,
    start_time: Instant,
    api_calls: AtomicU32,
    failed_calls: AtomicU32,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
    /// Per-stage metrics in first-seen order
    stages: RwLock<Vec<StageMetrics>>,
}

/// Metrics for one pipeline stage (accumulated across regeneration passes)
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageMetrics {
    pub name: String,
    pub api_calls: u32,
    pub failed_calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
}

/// Summary statistics for a run
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub run_id: String,
    pub total_duration_ms: u64,
    pub api_calls: u32,
    pub failed_calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub avg_latency_ms: f64,
    pub stages: Vec<StageMetrics>,
}

pub type SharedMetrics = Arc<MetricsCollector>;

impl MetricsCollector {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            start_time: Instant::now(),
            api_calls: AtomicU32::new(0),
            failed_calls: AtomicU32::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            stages: RwLock::new(Vec::new()),
        }
    }

    /// Record a successful model call made by `stage`
    pub fn record_response(&self, stage: &str, response: &LlmResponse) {
        let input = response.usage.input_tokens as u64;
        let output = response.usage.output_tokens as u64;
        let latency = response.timing.total_ms;

        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens.fetch_add(input, Ordering::Relaxed);
        self.output_tokens.fetch_add(output, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency, Ordering::Relaxed);

        self.with_stage(stage, |m| {
            m.api_calls += 1;
            m.input_tokens += input;
            m.output_tokens += output;
            m.latency_ms += latency;
        });
    }

    /// Record a model call made by `stage` that returned an error
    pub fn record_failure(&self, stage: &str) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
        self.with_stage(stage, |m| {
            m.api_calls += 1;
            m.failed_calls += 1;
        });
    }

    fn with_stage(&self, stage: &str, update: impl FnOnce(&mut StageMetrics)) {
        let mut stages = self.stages.write().unwrap_or_else(|poisoned| {
            tracing::error!("Metrics stages RwLock poisoned, recovering");
            poisoned.into_inner()
        });
        match stages.iter_mut().find(|m| m.name == stage) {
            Some(metrics) => update(metrics),
            None => {
                let mut metrics = StageMetrics {
                    name: stage.to_string(),
                    ..Default::default()
                };
                update(&mut metrics);
                stages.push(metrics);
            }
        }
    }

    /// Get final summary
    pub fn summary(&self) -> MetricsSummary {
        let api_calls = self.api_calls.load(Ordering::Relaxed);
        let input_tokens = self.input_tokens.load(Ordering::Relaxed);
        let output_tokens = self.output_tokens.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let avg_latency = if api_calls > 0 {
            total_latency as f64 / api_calls as f64
        } else {
            0.0
        };

        let stages = self
            .stages
            .read()
            .unwrap_or_else(|poisoned| {
                tracing::error!("Metrics stages RwLock poisoned on read, recovering");
                poisoned.into_inner()
            })
            .clone();

        MetricsSummary {
            run_id: self.run_id.clone(),
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            api_calls,
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            avg_latency_ms: avg_latency,
            stages,
        }
    }
}

impl MetricsSummary {
    /// Format summary for display
    pub fn display(&self) -> String {
        format!(
            "Duration: {:.1}s\n\
             API Calls: {} ({} failed)\n\
             Tokens: {} (input: {}, output: {})\n\
             Avg Latency: {:.0}ms",
            self.total_duration_ms as f64 / 1000.0,
            self.api_calls,
            self.failed_calls,
            self.total_tokens,
            self.input_tokens,
            self.output_tokens,
            self.avg_latency_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{ResponseMetadata, ResponseTiming, TokenUsage};
    use std::time::Duration;

    fn response(input: u32, output: u32, ms: u64) -> LlmResponse {
        LlmResponse::with_metrics(
            "x".to_string(),
            TokenUsage::from_openai(input, output),
            ResponseTiming::from_duration(Duration::from_millis(ms)),
            ResponseMetadata::default(),
        )
    }

    #[test]
    fn test_per_stage_accumulation() {
        let metrics = MetricsCollector::new("run");
        metrics.record_response("analyze", &response(10, 5, 100));
        metrics.record_response("analyze", &response(20, 5, 300));
        metrics.record_response("gen_routes", &response(1, 1, 50));
        metrics.record_failure("validate");

        let summary = metrics.summary();
        assert_eq!(summary.api_calls, 4);
        assert_eq!(summary.failed_calls, 1);
        assert_eq!(summary.total_tokens, 42);
        assert_eq!(summary.stages.len(), 3);
        assert_eq!(summary.stages[0].name, "analyze");
        assert_eq!(summary.stages[0].api_calls, 2);
        assert_eq!(summary.stages[0].latency_ms, 400);
        assert_eq!(summary.stages[2].failed_calls, 1);
    }

    #[test]
    fn test_empty_summary() {
        let summary = MetricsCollector::new("run").summary();
        assert_eq!(summary.api_calls, 0);
        assert_eq!(summary.avg_latency_ms, 0.0);
        assert!(summary.display().contains("API Calls: 0"));
    }
}
