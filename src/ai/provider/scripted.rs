//! Scripted Provider
//!
//! Deterministic provider that replays queued replies. Replies are keyed by
//! a marker substring of the prompt so concurrent stages pick the right one;
//! unkeyed replies are served in FIFO order when no marker matches.
//! Every call is recorded for inspection.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{
    GenerateOptions, LlmProvider, LlmResponse, ResponseMetadata, ResponseTiming, TokenUsage,
};
use crate::types::{ForgeError, LlmError, Result};

/// One canned reply
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub content: String,
    pub error: Option<LlmError>,
}

impl ScriptedReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    pub fn error(error: LlmError) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
        }
    }
}

/// A recorded invocation
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub prompt: String,
    pub temperature: Option<f32>,
}

#[derive(Debug, Default)]
struct Rule {
    marker: String,
    queue: VecDeque<ScriptedReply>,
    /// Served once the queue is drained
    fallback: Option<ScriptedReply>,
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<Rule>,
    defaults: VecDeque<ScriptedReply>,
    /// Served once `defaults` is drained
    default_fallback: Option<ScriptedReply>,
    calls: Vec<ScriptedCall>,
}

impl Script {
    fn rule_mut(&mut self, marker: &str) -> &mut Rule {
        let idx = match self.rules.iter().position(|r| r.marker == marker) {
            Some(idx) => idx,
            None => {
                self.rules.push(Rule {
                    marker: marker.to_string(),
                    ..Default::default()
                });
                self.rules.len() - 1
            }
        };
        &mut self.rules[idx]
    }

    fn next_reply(&mut self, prompt: &str) -> Option<ScriptedReply> {
        for rule in self.rules.iter_mut().filter(|r| prompt.contains(&r.marker)) {
            if let Some(reply) = rule.queue.pop_front() {
                return Some(reply);
            }
            if let Some(reply) = &rule.fallback {
                return Some(reply.clone());
            }
        }
        self.defaults
            .pop_front()
            .or_else(|| self.default_fallback.clone())
    }
}

/// File format accepted by [`ScriptedProvider::from_yaml_file`]
#[derive(Debug, Deserialize)]
struct ScriptEntry {
    #[serde(default)]
    marker: Option<String>,
    reply: String,
    #[serde(default)]
    repeat: bool,
}

/// Replays canned replies instead of calling a model
pub struct ScriptedProvider {
    script: Mutex<Script>,
    name: String,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            name: "scripted".to_string(),
        }
    }

    /// Load a script from YAML: a list of `{marker?, reply, repeat?}` entries
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<ScriptEntry> = serde_yaml::from_str(&raw)?;
        if entries.is_empty() {
            return Err(ForgeError::Config(format!(
                "Script {} contains no replies",
                path.display()
            )));
        }

        let provider = Self::new();
        for entry in entries {
            let reply = ScriptedReply::text(entry.reply);
            match (entry.marker, entry.repeat) {
                (Some(marker), true) => provider.always(&marker, reply),
                (Some(marker), false) => provider.on(&marker, reply),
                (None, true) => provider.always_default(reply),
                (None, false) => provider.push_default(reply),
            }
        }
        Ok(provider)
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| {
            tracing::error!("ScriptedProvider mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Queue a reply for prompts containing `marker`
    pub fn on(&self, marker: &str, reply: ScriptedReply) {
        self.lock().rule_mut(marker).queue.push_back(reply);
    }

    /// Reply used for `marker` whenever its queue is empty
    pub fn always(&self, marker: &str, reply: ScriptedReply) {
        self.lock().rule_mut(marker).fallback = Some(reply);
    }

    /// Queue a reply served when no marker matches
    pub fn push_default(&self, reply: ScriptedReply) {
        self.lock().defaults.push_back(reply);
    }

    /// Reply used when no marker matches and the default queue is empty
    pub fn always_default(&self, reply: ScriptedReply) {
        self.lock().default_fallback = Some(reply);
    }

    /// All prompts seen so far, in call order
    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.lock().calls.clone()
    }

    /// Number of calls whose prompt contains `marker`
    pub fn calls_matching(&self, marker: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.prompt.contains(marker))
            .count()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let script = self.lock();
        f.debug_struct("ScriptedProvider")
            .field("name", &self.name)
            .field("rules", &script.rules.len())
            .field("defaults", &script.defaults.len())
            .field("default_fallback", &script.default_fallback.is_some())
            .field("calls", &script.calls.len())
            .finish()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<LlmResponse> {
        let reply = {
            let mut script = self.lock();
            script.calls.push(ScriptedCall {
                prompt: prompt.to_string(),
                temperature: options.temperature,
            });
            script.next_reply(prompt)
        };

        let reply = reply.ok_or_else(|| {
            ForgeError::LlmApi("ScriptedProvider: no scripted reply for prompt".to_string())
        })?;

        if let Some(error) = reply.error {
            return Err(ForgeError::Llm(error));
        }

        Ok(LlmResponse::with_metrics(
            reply.content,
            TokenUsage::default(),
            ResponseTiming::from_duration(Duration::from_millis(1)),
            ResponseMetadata {
                model: "scripted".to_string(),
                provider: self.name.clone(),
            },
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorCategory;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_marker_routing_and_fifo() {
        let provider = ScriptedProvider::new();
        provider.on("alpha", ScriptedReply::text("a1"));
        provider.on("alpha", ScriptedReply::text("a2"));
        provider.push_default(ScriptedReply::text("d1"));

        let opts = GenerateOptions::default();
        assert_eq!(provider.generate("xx alpha", &opts).await.unwrap().content, "a1");
        assert_eq!(provider.generate("beta", &opts).await.unwrap().content, "d1");
        assert_eq!(provider.generate("alpha!", &opts).await.unwrap().content, "a2");
        assert!(provider.generate("alpha", &opts).await.is_err());
        assert_eq!(provider.calls().len(), 4);
        assert_eq!(provider.calls_matching("alpha"), 3);
    }

    #[tokio::test]
    async fn test_fallback_after_queue_drained() {
        let provider = ScriptedProvider::new();
        provider.on("review", ScriptedReply::text("first"));
        provider.always("review", ScriptedReply::text("again"));

        let opts = GenerateOptions::with_temperature(0.1);
        assert_eq!(provider.generate("review", &opts).await.unwrap().content, "first");
        assert_eq!(provider.generate("review", &opts).await.unwrap().content, "again");
        assert_eq!(provider.generate("review", &opts).await.unwrap().content, "again");
        assert_eq!(provider.calls()[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let provider = ScriptedProvider::new();
        provider.push_default(ScriptedReply::error(LlmError::new(
            ErrorCategory::Auth,
            "denied",
        )));
        let err = provider
            .generate("p", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Llm(ref e) if e.category == ErrorCategory::Auth));
    }

    #[tokio::test]
    async fn test_from_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.yaml");
        std::fs::write(
            &path,
            "- marker: review\n  reply: ok\n  repeat: true\n- reply: plain\n",
        )
        .unwrap();

        let provider = ScriptedProvider::from_yaml_file(&path).unwrap();
        let opts = GenerateOptions::default();
        assert_eq!(provider.generate("review", &opts).await.unwrap().content, "ok");
        assert_eq!(provider.generate("review", &opts).await.unwrap().content, "ok");
        assert_eq!(provider.generate("other", &opts).await.unwrap().content, "plain");
    }

    #[tokio::test]
    async fn test_unkeyed_repeat_reply_serves_every_call() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.yaml");
        std::fs::write(&path, "- reply: first\n- reply: hello\n  repeat: true\n").unwrap();

        let provider = ScriptedProvider::from_yaml_file(&path).unwrap();
        let opts = GenerateOptions::default();
        assert_eq!(provider.generate("a", &opts).await.unwrap().content, "first");
        assert_eq!(provider.generate("b", &opts).await.unwrap().content, "hello");
        assert_eq!(provider.generate("c", &opts).await.unwrap().content, "hello");
        assert_eq!(provider.calls().len(), 3);
    }

    #[test]
    fn test_empty_yaml_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.yaml");
        std::fs::write(&path, "[]\n").unwrap();
        assert!(ScriptedProvider::from_yaml_file(&path).is_err());
    }
}
