//! Scripted LLMs, stub tools and config fixtures shared by the Wayfarer test suites.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::{json, Value};

use wayfarer_core::config::{AppConfig, ModelConfig};
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::event::DataItemKind;
use wayfarer_core::traits::{LlmClient, Tool};
use wayfarer_core::types::*;

/// Model config pointing nowhere; only meaningful with a scripted client.
pub fn test_model_config() -> ModelConfig {
    ModelConfig {
        provider: "openai".into(),
        model_id: "test-model".into(),
        api_key: None,
        base_url: None,
        max_tokens: 256,
        temperature: 0.0,
        retry: None,
        extra_headers: Default::default(),
    }
}

/// App config with an in-memory store and no network tools configured.
pub fn test_config() -> AppConfig {
    AppConfig::from_toml(
        r#"
[model]
model_id = "test-model"

[store]
backend = "memory"
"#,
    )
    .expect("test config parses")
}

/// Temp directory with a checkpoint database path inside it.
pub fn temp_db() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("checkpoints.db");
    (dir, path)
}

/// One recorded call to a [`ScriptedLlm`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// An LLM that replays pre-scripted delta sequences, one per call.
///
/// Calls beyond the script fail with `LlmRequest`.
pub struct ScriptedLlm {
    turns: Mutex<VecDeque<Vec<StreamDelta>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    pub fn new(turns: Vec<Vec<StreamDelta>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Plain streamed text, no tool calls.
    pub fn text_turn(chunks: &[&str]) -> Vec<StreamDelta> {
        let mut deltas: Vec<StreamDelta> = chunks
            .iter()
            .map(|c| StreamDelta::TextDelta(c.to_string()))
            .collect();
        deltas.push(StreamDelta::Stop(StopReason::EndTurn));
        deltas
    }

    /// Streamed text followed by tool calls and, when `next` is set, a `route` call.
    pub fn decision(chunks: &[&str], tools: &[(&str, Value)], next: Option<&str>) -> Vec<StreamDelta> {
        let mut deltas: Vec<StreamDelta> = chunks
            .iter()
            .map(|c| StreamDelta::TextDelta(c.to_string()))
            .collect();
        let mut index = 0;
        for (name, args) in tools {
            deltas.push(StreamDelta::ToolUseStart {
                index,
                id: format!("call_{}_{}", name, index),
                name: name.to_string(),
            });
            deltas.push(StreamDelta::ToolInputDelta {
                index,
                delta: args.to_string(),
            });
            index += 1;
        }
        if let Some(next) = next {
            deltas.push(StreamDelta::ToolUseStart {
                index,
                id: format!("call_route_{}", index),
                name: "route".into(),
            });
            deltas.push(StreamDelta::ToolInputDelta {
                index,
                delta: json!({ "nextNode": next }).to_string(),
            });
        }
        deltas.push(StreamDelta::Stop(StopReason::ToolUse));
        deltas
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn remaining(&self) -> usize {
        self.turns.lock().expect("turns lock").len()
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            messages,
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        });
        let next = self.turns.lock().expect("turns lock").pop_front();
        Box::pin(async move {
            let deltas = next.ok_or_else(|| WayfarerError::LlmRequest("script exhausted".into()))?;
            let stream = futures::stream::iter(deltas.into_iter().map(Ok));
            Ok(Box::pin(stream) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

/// A tool that returns a fixed payload and counts invocations.
pub struct StubTool {
    name: String,
    output: Value,
    kind: Option<DataItemKind>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StubTool {
    pub fn new(name: &str, output: Value) -> Self {
        Self {
            name: name.to_string(),
            output,
            kind: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn streamed_as(mut self, kind: DataItemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared invocation counter, usable after the tool is moved into a registry.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Stub tool for tests"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    fn data_item(&self) -> Option<DataItemKind> {
        self.kind
    }

    fn execute(&self, _input: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(ToolOutput::success(self.output.clone()))
        })
    }
}

/// A tool whose every invocation fails.
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    fn execute(&self, _input: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            Err(WayfarerError::ToolExecution {
                tool: self.name.clone(),
                message: self.message.clone(),
            })
        })
    }
}

/// A tool whose body panics, like an adapter indexing an empty response.
pub struct PanickingTool {
    name: String,
}

impl PanickingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Tool for PanickingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always panics"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    fn execute(&self, _input: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            let reviews: Vec<Value> = vec![];
            Ok(ToolOutput::success(reviews[0].clone()))
        })
    }
}
