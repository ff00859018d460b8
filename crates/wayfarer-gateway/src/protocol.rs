use serde::Deserialize;
use serde_json::Value;

use wayfarer_agent::{TurnInput, TurnRequest};
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::types::ThreadId;

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ClientMessage>,
    #[serde(default)]
    pub session_id: String,
}

/// A chat message as the web client sends it. Only `content` and the
/// init marker in `data` are read.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    #[allow(dead_code)]
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ClientMessage {
    pub fn is_init(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.get("isInitMessage"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl ChatRequest {
    /// Interpret the request as a fresh start or a resume of `sessionId`.
    pub fn into_turn_request(self) -> Result<TurnRequest> {
        let session_id = self.session_id.trim();
        if session_id.is_empty() {
            return Err(WayfarerError::InvalidRequest("sessionId is required".into()));
        }
        let first = self
            .messages
            .into_iter()
            .next()
            .ok_or_else(|| WayfarerError::InvalidRequest("messages must not be empty".into()))?;

        let input = if first.is_init() {
            TurnInput::Start
        } else if first.content.trim().is_empty() {
            return Err(WayfarerError::InvalidRequest("message content is empty".into()));
        } else {
            TurnInput::Resume(first.content)
        };

        Ok(TurnRequest {
            thread_id: ThreadId::from_string(session_id),
            input,
        })
    }
}
