use thiserror::Error;

#[derive(Debug, Error)]
pub enum WayfarerError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Graph errors
    #[error("Routing contract violation: {node} may not route to {target}")]
    RoutingViolation { node: String, target: String },

    #[error("Decision from {node} failed schema validation: {message}")]
    DecisionSchema { node: String, message: String },

    #[error("Node not registered in graph: {0}")]
    NodeNotRegistered(String),

    #[error("Turn exceeded max steps ({0}) without reaching a suspension point")]
    MaxStepsExceeded(usize),

    #[error("Turn cancelled")]
    Cancelled,

    // Thread errors
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Thread busy: a turn is already in flight for {0}")]
    ThreadBusy(String),

    #[error("Checkpoint conflict on thread {thread_id}: expected parent {expected:?}, latest is {latest:?}")]
    CheckpointConflict {
        thread_id: String,
        expected: Option<u64>,
        latest: Option<u64>,
    },

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WayfarerError {
    /// True for errors that break the routing contract of a turn.
    pub fn is_routing_violation(&self) -> bool {
        matches!(
            self,
            Self::RoutingViolation { .. } | Self::DecisionSchema { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WayfarerError>;
