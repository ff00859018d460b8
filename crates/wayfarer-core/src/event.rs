use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::{AdvisorId, NodeId};
use crate::types::ThreadId;

/// Type tag of a structured data item delivered to the client.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataItemKind {
    Weather,
    HotelSearch,
    SightSearch,
    SearchQuery,
    SearchExecution,
    SearchSummary,
    TransferToHotel,
    TransferToTravel,
    TransferToWeather,
    TransferToSights,
}

impl DataItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::HotelSearch => "hotel-search",
            Self::SightSearch => "sight-search",
            Self::SearchQuery => "search-query",
            Self::SearchExecution => "search-execution",
            Self::SearchSummary => "search-summary",
            Self::TransferToHotel => "transfer-to-hotel",
            Self::TransferToTravel => "transfer-to-travel",
            Self::TransferToWeather => "transfer-to-weather",
            Self::TransferToSights => "transfer-to-sights",
        }
    }
}

/// A typed structured payload, distinct from free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: DataItemKind,
    pub data: serde_json::Value,
}

impl DataItem {
    pub fn new(kind: DataItemKind, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            data,
        }
    }
}

/// Internal execution events emitted while a turn runs.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// Turn started for a thread.
    TurnStarted { thread_id: ThreadId, resumed: bool },
    /// The engine handed control to a node.
    NodeEntered { node: NodeId },
    /// Incremental advisor speech.
    TextDelta { advisor: AdvisorId, text: String },
    /// Completed structured result.
    Data(DataItem),
    /// A requested tool was dropped from the batch.
    ToolDropped { tool: String, reason: String },
    /// The graph suspended waiting for human input.
    Suspended { prompt: String, seq: u64 },
    /// The turn aborted.
    TurnFailed { error: String },
}

/// Ordered, per-turn event channel.
///
/// Events are delivered to the receiver in exactly the order they were published.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TurnEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sink nobody listens to.
    pub fn discard() -> Self {
        let (sink, _rx) = Self::channel();
        sink
    }

    pub fn publish(&self, event: TurnEvent) {
        // Ignore error if the receiver is gone
        let _ = self.tx.send(event);
    }

    /// True once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
