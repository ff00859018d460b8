use std::collections::HashSet;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use wayfarer_core::config::ModelConfig;
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::traits::LlmClient;
use wayfarer_core::types::*;

use crate::streaming::{SseEvent, SseStream};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completions client (OpenAI, Azure-style proxies, Ollama, vLLM).
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
}

#[derive(Serialize, Debug)]
pub(crate) struct OaiMessage {
    pub(crate) role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tool_calls: Option<Vec<OaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tool_call_id: Option<String>,
}

impl OaiMessage {
    fn plain(role: &'static str, content: String) -> Self {
        Self {
            role,
            name: None,
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiToolCall {
    #[serde(default)]
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) function: Option<OaiFunction>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) arguments: Option<String>,
}

#[derive(Serialize)]
struct OaiTool {
    r#type: &'static str,
    function: OaiToolDef,
}

#[derive(Serialize)]
struct OaiToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<ChoiceDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ChoiceDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OaiToolCall>>,
}

#[derive(Deserialize, Debug)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<OaiTool> {
    tools
        .iter()
        .map(|t| OaiTool {
            r#type: "function",
            function: OaiToolDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

/// Map conversation history onto the chat completions message format.
///
/// Assistant tool calls that never received a tool response (for example
/// requests for unknown tools that were dropped) are omitted, since the API
/// rejects unanswered call ids.
pub(crate) fn convert_messages(messages: Vec<Message>) -> Vec<OaiMessage> {
    let answered: HashSet<String> = messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.clone())
        .collect();

    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        match msg.role {
            Role::System => out.push(OaiMessage::plain("system", msg.text())),
            Role::User => out.push(OaiMessage::plain("user", msg.text())),
            Role::Assistant => {
                let calls: Vec<OaiToolCall> = msg
                    .tool_calls
                    .iter()
                    .filter_map(|tc| {
                        let id = tc.call_id.as_ref().filter(|id| answered.contains(*id))?;
                        Some(OaiToolCall {
                            index: 0,
                            id: Some(id.clone()),
                            r#type: Some("function".to_string()),
                            function: Some(OaiFunction {
                                name: Some(tc.tool_name.clone()),
                                arguments: Some(tc.args.to_string()),
                            }),
                        })
                    })
                    .collect();
                let text = msg.text();
                if calls.is_empty() && text.is_empty() {
                    continue;
                }
                out.push(OaiMessage {
                    role: "assistant",
                    name: msg.sender_name.clone(),
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: (!calls.is_empty()).then_some(calls),
                    tool_call_id: None,
                });
            }
            Role::Tool => match msg.tool_call_id.clone() {
                Some(id) => out.push(OaiMessage {
                    role: "tool",
                    name: None,
                    content: Some(msg.text()),
                    tool_calls: None,
                    tool_call_id: Some(id),
                }),
                None => {
                    let tool = msg.sender_name.as_deref().unwrap_or("tool");
                    out.push(OaiMessage::plain(
                        "user",
                        format!("Result from {}: {}", tool, msg.text()),
                    ));
                }
            },
        }
    }
    out
}

pub(crate) fn parse_chunk(event: SseEvent) -> Vec<Result<StreamDelta>> {
    if event.data.trim() == "[DONE]" {
        return vec![];
    }

    let chunk: StreamChunk = match serde_json::from_str(&event.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse completion chunk");
            return vec![];
        }
    };

    let mut deltas = Vec::new();
    for choice in chunk.choices {
        let delta = choice.delta.unwrap_or_default();
        if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
            deltas.push(Ok(StreamDelta::TextDelta(text)));
        }
        // Some providers send name and arguments in one chunk.
        for tc in delta.tool_calls.unwrap_or_default() {
            let Some(func) = tc.function else { continue };
            if let Some(name) = func.name {
                deltas.push(Ok(StreamDelta::ToolUseStart {
                    index: tc.index,
                    id: tc.id.unwrap_or_default(),
                    name,
                }));
            }
            if let Some(args) = func.arguments.filter(|a| !a.is_empty()) {
                deltas.push(Ok(StreamDelta::ToolInputDelta {
                    index: tc.index,
                    delta: args,
                }));
            }
        }
        if let Some(reason) = choice.finish_reason {
            let stop = match reason.as_str() {
                "tool_calls" | "function_call" => StopReason::ToolUse,
                "length" => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            };
            deltas.push(Ok(StreamDelta::Stop(stop)));
        }
    }

    if let Some(usage) = chunk.usage {
        deltas.push(Ok(StreamDelta::Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }
    deltas
}

impl LlmClient for OpenAiClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = convert_tools(tools);

        Box::pin(async move {
            let url = config.base_url.as_deref().unwrap_or(OPENAI_API_URL);
            let body = ChatRequest {
                model: config.model_id.clone(),
                messages: convert_messages(messages),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                stream: true,
                tools,
            };
            debug!(model = %config.model_id, messages = body.messages.len(), "Sending completion request");

            let mut req = self.http.post(url).json(&body);
            if let Some(api_key) = &config.api_key {
                req = req.bearer_auth(api_key);
            }
            for (k, v) in &config.extra_headers {
                req = req.header(k.as_str(), v.as_str());
            }

            let response = req
                .send()
                .await
                .map_err(|e| WayfarerError::LlmRequest(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(WayfarerError::LlmRequest(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body
                )));
            }

            let deltas = SseStream::new(response.bytes_stream())
                .map(|event| futures::stream::iter(parse_chunk(event)))
                .flatten();

            Ok(Box::pin(deltas) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}
