pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, WayfarerError};
pub use event::{DataItem, DataItemKind, EventSink, TurnEvent};
pub use state::{AdvisorId, Checkpoint, ConversationState, NodeId, Route, RouteDecision};
pub use types::*;
