use futures::future::BoxFuture;

use wayfarer_core::error::Result;
use wayfarer_core::state::{AdvisorId, ConversationState, NodeId, RouteDecision};

use super::context::TurnContext;

/// What a node hands back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    Route(RouteDecision),
    /// Stop the turn here and persist; the next request resumes the graph.
    Suspend { prompt: String },
}

/// A node of the routing graph.
pub trait GraphNode: Send + Sync {
    fn id(&self) -> NodeId;

    /// Advisors this node may hand control to. `finish` is always allowed.
    fn allowed_destinations(&self) -> &[AdvisorId];

    fn run<'a>(
        &'a self,
        state: &'a ConversationState,
        ctx: &'a TurnContext<'a>,
    ) -> BoxFuture<'a, Result<NodeOutcome>>;
}
