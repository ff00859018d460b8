use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use wayfarer_core::config::{GraphConfig, ModelConfig};
use wayfarer_core::event::EventSink;
use wayfarer_core::traits::{CheckpointStore, LlmClient};
use wayfarer_core::types::ThreadId;
use wayfarer_tools::ToolRegistry;

/// Everything a turn needs, constructed once at startup and shared read-only.
pub struct GraphContext {
    pub llm: Arc<dyn LlmClient>,
    pub model: ModelConfig,
    pub tools: Arc<ToolRegistry>,
    pub store: Arc<dyn CheckpointStore>,
    pub graph: GraphConfig,
}

/// Per-turn view handed to nodes.
pub struct TurnContext<'a> {
    pub thread_id: &'a ThreadId,
    pub shared: &'a GraphContext,
    pub sink: &'a EventSink,
    pub cancel: &'a CancellationToken,
}
