use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::DataItemKind;
use crate::types::{Message, ThreadId, ToolRequest};

/// The advisor personas that can hold control of a conversation.
///
/// Routing targets are a closed set: a decision naming anything else is
/// rejected before the engine acts on it.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvisorId {
    TravelAdvisor,
    WeatherAdvisor,
    HotelAdvisor,
    SightseeingAdvisor,
}

impl AdvisorId {
    pub const ALL: [AdvisorId; 4] = [
        AdvisorId::TravelAdvisor,
        AdvisorId::WeatherAdvisor,
        AdvisorId::HotelAdvisor,
        AdvisorId::SightseeingAdvisor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TravelAdvisor => "travelAdvisor",
            Self::WeatherAdvisor => "weatherAdvisor",
            Self::HotelAdvisor => "hotelAdvisor",
            Self::SightseeingAdvisor => "sightseeingAdvisor",
        }
    }

    /// Data item published when control is handed to this advisor.
    pub fn transfer_kind(&self) -> DataItemKind {
        match self {
            Self::TravelAdvisor => DataItemKind::TransferToTravel,
            Self::WeatherAdvisor => DataItemKind::TransferToWeather,
            Self::HotelAdvisor => DataItemKind::TransferToHotel,
            Self::SightseeingAdvisor => DataItemKind::TransferToSights,
        }
    }
}

impl fmt::Display for AdvisorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdvisorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "travelAdvisor" | "travel_advisor" => Ok(Self::TravelAdvisor),
            "weatherAdvisor" | "weather_advisor" => Ok(Self::WeatherAdvisor),
            "hotelAdvisor" | "hotel_advisor" => Ok(Self::HotelAdvisor),
            "sightseeingAdvisor" | "sightseeing_advisor" => Ok(Self::SightseeingAdvisor),
            other => Err(format!("unknown advisor '{}'", other)),
        }
    }
}

/// A node of the routing graph.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeId {
    Advisor(AdvisorId),
    /// The tool invocation stage. Never a routing target and never an active sender.
    ToolStage,
    Human,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advisor(a) => a.as_str(),
            Self::ToolStage => "tools",
            Self::Human => "human",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tools" => Ok(Self::ToolStage),
            "human" => Ok(Self::Human),
            other => other.parse().map(Self::Advisor),
        }
    }
}

impl TryFrom<String> for NodeId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.as_str().to_string()
    }
}

impl From<AdvisorId> for NodeId {
    fn from(value: AdvisorId) -> Self {
        Self::Advisor(value)
    }
}

/// Where an advisor wants control to go next.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Route {
    Advisor(AdvisorId),
    /// End of the advisor's turn; the engine maps this to the human-input node.
    Finish,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advisor(a) => f.write_str(a.as_str()),
            Self::Finish => f.write_str("finish"),
        }
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "finish" | "FINISH" => Ok(Self::Finish),
            other => other.parse().map(Self::Advisor),
        }
    }
}

/// Structured output of every advisor node.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub response_text: String,
    pub next: Route,
    pub requested_tools: Vec<ToolRequest>,
}

impl RouteDecision {
    pub fn finish(response_text: impl Into<String>) -> Self {
        Self {
            response_text: response_text.into(),
            next: Route::Finish,
            requested_tools: vec![],
        }
    }

    pub fn goto(advisor: AdvisorId) -> Self {
        Self {
            response_text: String::new(),
            next: Route::Advisor(advisor),
            requested_tools: vec![],
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolRequest>) -> Self {
        self.requested_tools = tools;
        self
    }
}

/// Per-thread conversation state, owned by the engine during a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub thread_id: ThreadId,
    pub messages: Vec<Message>,
    /// Last advisor to hold control.
    #[serde(default)]
    pub active_sender: Option<AdvisorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_tool_request: Option<Vec<ToolRequest>>,
}

impl ConversationState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: vec![],
            active_sender: None,
            pending_tool_request: None,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn append_all(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// A persisted snapshot of conversation state plus suspension marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub thread_id: ThreadId,
    /// Position in the thread's history, assigned by the store (starts at 1).
    pub seq: u64,
    /// Checkpoint this one was derived from. `None` starts a new chain.
    pub parent_seq: Option<u64>,
    pub state: ConversationState,
    pub suspended_at: Option<NodeId>,
    /// What the suspended node is waiting for.
    #[serde(default)]
    pub prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Build a checkpoint suspended at the human-input node. `seq` is filled in by the store.
    pub fn suspended_at_human(
        state: ConversationState,
        parent_seq: Option<u64>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: state.thread_id.clone(),
            seq: 0,
            parent_seq,
            state,
            suspended_at: Some(NodeId::Human),
            prompt: Some(prompt.into()),
            created_at: Utc::now(),
        }
    }

    pub fn is_suspended_at_human(&self) -> bool {
        self.suspended_at == Some(NodeId::Human)
    }
}
