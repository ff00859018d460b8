use futures::future::BoxFuture;

use wayfarer_core::error::Result;
use wayfarer_core::state::{AdvisorId, ConversationState, NodeId};

use super::context::TurnContext;
use super::node::{GraphNode, NodeOutcome};

/// Waits for the traveller. Every visit suspends the graph.
pub struct HumanNode {
    prompt: String,
}

impl HumanNode {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl GraphNode for HumanNode {
    fn id(&self) -> NodeId {
        NodeId::Human
    }

    fn allowed_destinations(&self) -> &[AdvisorId] {
        &[]
    }

    fn run<'a>(
        &'a self,
        _state: &'a ConversationState,
        _ctx: &'a TurnContext<'a>,
    ) -> BoxFuture<'a, Result<NodeOutcome>> {
        Box::pin(async move {
            Ok(NodeOutcome::Suspend {
                prompt: self.prompt.clone(),
            })
        })
    }
}
