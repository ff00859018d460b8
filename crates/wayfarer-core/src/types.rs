use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ModelConfig;
use crate::traits::LlmClient;

/// Identifier scoping one conversation's durable state.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Body of a message: free text or a structured tool payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    Data { data: serde_json::Value },
}

/// A tool invocation requested by an advisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRequest {
    /// Provider-side call id, when the model supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub tool_name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            call_id: None,
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    /// Advisor (or tool) that produced this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolRequest>,
    /// For tool results: the call id this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    fn build(role: Role, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            sender_name: None,
            content,
            tool_calls: vec![],
            tool_call_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::build(Role::User, MessageContent::Text { text: text.into() })
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::build(Role::System, MessageContent::Text { text: text.into() })
    }

    pub fn assistant(
        sender: impl Into<String>,
        text: impl Into<String>,
        tool_calls: Vec<ToolRequest>,
    ) -> Self {
        let mut msg = Self::build(Role::Assistant, MessageContent::Text { text: text.into() });
        msg.sender_name = Some(sender.into());
        msg.tool_calls = tool_calls;
        msg
    }

    /// A successful tool result carrying a structured envelope.
    pub fn tool_data(request: &ToolRequest, data: serde_json::Value) -> Self {
        let mut msg = Self::build(Role::Tool, MessageContent::Data { data });
        msg.sender_name = Some(request.tool_name.clone());
        msg.tool_call_id = request.call_id.clone();
        msg
    }

    /// A failed tool result carrying a human-readable error string.
    pub fn tool_error(request: &ToolRequest, text: impl Into<String>) -> Self {
        let mut msg = Self::build(Role::Tool, MessageContent::Text { text: text.into() });
        msg.sender_name = Some(request.tool_name.clone());
        msg.tool_call_id = request.call_id.clone();
        msg
    }

    /// Text form of the content. Structured payloads are rendered as JSON.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Data { data } => data.to_string(),
        }
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// Start of a tool use block.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A chunk of tool use input JSON.
    ToolInputDelta { index: usize, delta: String },

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Tool definition for sending to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: serde_json::Value,
    /// Optional side artifact (e.g. an HTML gallery fragment).
    pub artifact: Option<String>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: serde_json::Value) -> Self {
        Self {
            content,
            artifact: None,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: serde_json::Value::String(message.into()),
            artifact: None,
            is_error: true,
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }
}

/// Context passed to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    pub thread_id: ThreadId,
    /// Model access for tools that need generation (query writing, summaries).
    pub llm: Option<Arc<dyn LlmClient>>,
    pub model: Option<ModelConfig>,
}

impl ToolContext {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            llm: None,
            model: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        self.llm = Some(llm);
        self.model = Some(model);
        self
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("thread_id", &self.thread_id)
            .field("llm", &self.llm.is_some())
            .field("model", &self.model.as_ref().map(|m| &m.model_id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let msg = Message::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"]["type"], "text");
        assert_eq!(json["content"]["text"], "hello");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("sender_name").is_none());
    }

    #[test]
    fn test_tool_messages_carry_call_id() {
        let mut req = ToolRequest::new("weatherForecast", serde_json::json!({"lat": 1.0}));
        req.call_id = Some("call_1".into());

        let ok = Message::tool_data(&req, serde_json::json!({"tool": "weatherForecast"}));
        assert_eq!(ok.role, Role::Tool);
        assert_eq!(ok.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(ok.sender_name.as_deref(), Some("weatherForecast"));

        let err = Message::tool_error(&req, "Error running weatherForecast: boom");
        assert_eq!(err.text(), "Error running weatherForecast: boom");
    }

    #[test]
    fn test_data_message_text_is_json() {
        let req = ToolRequest::new("geocode", serde_json::Value::Null);
        let msg = Message::tool_data(&req, serde_json::json!({"lat": 48.85}));
        assert_eq!(msg.text(), r#"{"lat":48.85}"#);
    }
}
