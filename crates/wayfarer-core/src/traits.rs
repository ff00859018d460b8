use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::event::DataItemKind;
use crate::state::Checkpoint;
use crate::types::*;

/// Streaming chat-completions client.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// An adapter around an external data source.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input and context.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolOutput>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }

    /// Data item kind under which successful results are streamed to the client.
    fn data_item(&self) -> Option<DataItemKind> {
        None
    }
}

/// Append-only checkpoint history per thread.
pub trait CheckpointStore: Send + Sync + 'static {
    /// Latest checkpoint for a thread, if any.
    fn load_latest(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Option<Checkpoint>>>;

    /// Append a checkpoint and return it with its assigned `seq`.
    ///
    /// When `parent_seq` is set it must equal the thread's latest `seq`,
    /// otherwise the write is rejected with `CheckpointConflict`.
    fn append(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<Checkpoint>>;

    /// All checkpoints for a thread, oldest first.
    fn history(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Vec<Checkpoint>>>;

    /// Delete all checkpoints for a thread. Returns the number removed.
    fn delete_thread(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<usize>>;

    /// Thread ids with at least one checkpoint, most recently active first.
    fn list_threads(&self, limit: usize) -> BoxFuture<'_, Result<Vec<ThreadId>>>;
}
