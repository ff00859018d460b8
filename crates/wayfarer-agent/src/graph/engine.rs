use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use wayfarer_core::config::AppConfig;
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::event::{DataItem, EventSink, TurnEvent};
use wayfarer_core::state::{AdvisorId, Checkpoint, ConversationState, NodeId, Route, RouteDecision};
use wayfarer_core::types::{Message, ThreadId};

use super::advisor::{advisors_from_config, AdvisorNode, AgentDescriptor};
use super::context::{GraphContext, TurnContext};
use super::human::HumanNode;
use super::node::{GraphNode, NodeOutcome};
use super::tool_stage::ToolStage;
use crate::lane::{LaneGuard, ThreadLanes};

/// How a request enters the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    /// Initialization marker: start a fresh conversation at the entry node.
    Start,
    /// The traveller's reply to a suspended thread.
    Resume(String),
}

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub thread_id: ThreadId,
    pub input: TurnInput,
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The checkpoint written at suspension.
    pub checkpoint: Checkpoint,
    pub steps: usize,
}

/// The statically registered advisor graph.
pub struct GraphEngine {
    ctx: GraphContext,
    advisors: HashMap<AdvisorId, AdvisorNode>,
    human: HumanNode,
    tool_stage: ToolStage,
    lanes: ThreadLanes,
}

impl GraphEngine {
    /// Build the graph. Every advisor named as a destination or as the
    /// entry node must be registered.
    pub fn new(ctx: GraphContext, descriptors: Vec<AgentDescriptor>) -> Result<Self> {
        let advisors: HashMap<AdvisorId, AdvisorNode> = descriptors
            .into_iter()
            .map(|d| (d.id, AdvisorNode::new(d)))
            .collect();

        if !advisors.contains_key(&ctx.graph.entry_node) {
            return Err(WayfarerError::NodeNotRegistered(ctx.graph.entry_node.to_string()));
        }
        for node in advisors.values() {
            let d = node.descriptor();
            if let Some(missing) = d.destinations.iter().find(|t| !advisors.contains_key(t)) {
                return Err(WayfarerError::Config(format!(
                    "{} routes to unregistered advisor {}",
                    d.id, missing
                )));
            }
            for tool in d.tools.iter().filter(|t| !ctx.tools.contains(t)) {
                warn!(advisor = %d.id, tool = %tool, "Advisor references a tool that is not registered");
            }
        }

        Ok(Self {
            human: HumanNode::new(ctx.graph.human_prompt.clone()),
            tool_stage: ToolStage::new(ctx.graph.tool_concurrency),
            lanes: ThreadLanes::new(),
            advisors,
            ctx,
        })
    }

    /// Build the graph with the stock personas and the config's overrides.
    pub fn from_config(config: &AppConfig, ctx: GraphContext) -> Result<Self> {
        Self::new(ctx, advisors_from_config(config))
    }

    pub fn context(&self) -> &GraphContext {
        &self.ctx
    }

    pub fn lanes(&self) -> &ThreadLanes {
        &self.lanes
    }

    pub fn descriptor(&self, advisor: AdvisorId) -> Option<&AgentDescriptor> {
        self.advisors.get(&advisor).map(|n| n.descriptor())
    }

    /// Claim the thread and load its starting state.
    ///
    /// Everything that can fail before output begins fails here: a busy
    /// thread, an unknown thread, an unreachable store.
    pub async fn begin(self: &Arc<Self>, request: TurnRequest) -> Result<PreparedTurn> {
        let guard = self.lanes.try_acquire(&request.thread_id)?;
        let thread_id = request.thread_id;

        let (state, start, parent_seq) = match request.input {
            TurnInput::Start => match self.ctx.store.load_latest(&thread_id).await? {
                // A repeated init marker re-enters the entry node on top of
                // the existing chain so history stays append-only.
                Some(checkpoint) => {
                    info!(thread_id = %thread_id, seq = checkpoint.seq, "Restarting at entry node on existing thread");
                    (checkpoint.state, self.ctx.graph.entry_node, Some(checkpoint.seq))
                }
                None => {
                    let mut state = ConversationState::new(thread_id.clone());
                    state.append(Message::system(self.ctx.graph.intro_message.clone()));
                    info!(thread_id = %thread_id, "Starting new conversation");
                    (state, self.ctx.graph.entry_node, None)
                }
            },
            TurnInput::Resume(text) => {
                let checkpoint = self
                    .ctx
                    .store
                    .load_latest(&thread_id)
                    .await?
                    .ok_or_else(|| WayfarerError::ThreadNotFound(thread_id.to_string()))?;
                if !checkpoint.is_suspended_at_human() {
                    warn!(thread_id = %thread_id, seq = checkpoint.seq, "Latest checkpoint is not suspended at human input");
                }
                let mut state = checkpoint.state;
                state.append(Message::user(text));
                let start = state.active_sender.unwrap_or(self.ctx.graph.entry_node);
                info!(thread_id = %thread_id, seq = checkpoint.seq, resume_at = %start, "Resuming conversation");
                (state, start, Some(checkpoint.seq))
            }
        };

        Ok(PreparedTurn {
            engine: Arc::clone(self),
            _guard: guard,
            resumed: parent_seq.is_some(),
            state,
            start,
            parent_seq,
        })
    }

    /// `begin` followed by `run`.
    pub async fn run_turn(
        self: &Arc<Self>,
        request: TurnRequest,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        self.begin(request).await?.run(sink, cancel).await
    }

    fn advisor(&self, id: AdvisorId) -> Result<&AdvisorNode> {
        self.advisors
            .get(&id)
            .ok_or_else(|| WayfarerError::NodeNotRegistered(id.to_string()))
    }
}

/// A turn that holds its thread's lane and is ready to execute.
pub struct PreparedTurn {
    engine: Arc<GraphEngine>,
    _guard: LaneGuard,
    state: ConversationState,
    start: AdvisorId,
    parent_seq: Option<u64>,
    resumed: bool,
}

impl PreparedTurn {
    pub fn thread_id(&self) -> &ThreadId {
        &self.state.thread_id
    }

    /// Execute nodes until the graph suspends. Fatal errors are also
    /// published as `TurnFailed` so a streaming client sees them.
    pub async fn run(self, sink: EventSink, cancel: CancellationToken) -> Result<TurnOutcome> {
        let thread_id = self.state.thread_id.clone();
        let started = Instant::now();
        let result = self.execute(&sink, &cancel).await;

        match &result {
            Ok(outcome) => info!(
                thread_id = %thread_id,
                seq = outcome.checkpoint.seq,
                steps = outcome.steps,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Turn suspended at human input"
            ),
            Err(WayfarerError::Cancelled) => info!(thread_id = %thread_id, "Turn cancelled"),
            Err(e) => {
                error!(thread_id = %thread_id, error = %e, "Turn failed");
                sink.publish(TurnEvent::TurnFailed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn execute(self, sink: &EventSink, cancel: &CancellationToken) -> Result<TurnOutcome> {
        let PreparedTurn {
            engine,
            _guard,
            mut state,
            start,
            parent_seq,
            resumed,
        } = self;
        let shared = &engine.ctx;
        let thread_id = state.thread_id.clone();
        let ctx = TurnContext {
            thread_id: &thread_id,
            shared,
            sink,
            cancel,
        };

        sink.publish(TurnEvent::TurnStarted {
            thread_id: thread_id.clone(),
            resumed,
        });

        let max_steps = shared.graph.max_steps_per_turn;
        let mut current = NodeId::Advisor(start);
        let mut steps = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(WayfarerError::Cancelled);
            }
            steps += 1;
            if steps > max_steps {
                warn!(thread_id = %thread_id, max_steps, "Turn exceeded step limit");
                return Err(WayfarerError::MaxStepsExceeded(max_steps));
            }
            debug!(thread_id = %thread_id, node = %current, step = steps, "Entering node");
            sink.publish(TurnEvent::NodeEntered { node: current });

            let outcome = match current {
                NodeId::Advisor(id) => {
                    state.active_sender = Some(id);
                    let node = engine.advisor(id)?;
                    let outcome = node.run(&state, &ctx).await?;
                    if let NodeOutcome::Route(decision) = &outcome {
                        validate(node, decision)?;
                    }
                    outcome
                }
                NodeId::ToolStage => {
                    let sender = state.active_sender.unwrap_or(shared.graph.entry_node);
                    let requests = state.pending_tool_request.take().unwrap_or_default();
                    let descriptor = engine.advisor(sender)?.descriptor();
                    let messages = engine.tool_stage.run(descriptor, requests, &ctx).await?;
                    state.append_all(messages);
                    current = NodeId::Advisor(sender);
                    continue;
                }
                NodeId::Human => engine.human.run(&state, &ctx).await?,
            };

            match outcome {
                NodeOutcome::Suspend { prompt } => {
                    if cancel.is_cancelled() {
                        return Err(WayfarerError::Cancelled);
                    }
                    let checkpoint = shared
                        .store
                        .append(Checkpoint::suspended_at_human(state, parent_seq, prompt.clone()))
                        .await?;
                    sink.publish(TurnEvent::Suspended {
                        prompt,
                        seq: checkpoint.seq,
                    });
                    return Ok(TurnOutcome { checkpoint, steps });
                }
                NodeOutcome::Route(decision) => {
                    let from = state.active_sender.unwrap_or(shared.graph.entry_node);
                    current = apply_decision(&mut state, from, decision, sink);
                }
            }
        }
    }
}

/// Reject a route to any advisor outside the node's destinations.
fn validate(node: &dyn GraphNode, decision: &RouteDecision) -> Result<()> {
    if let Route::Advisor(target) = decision.next {
        if !node.allowed_destinations().contains(&target) {
            return Err(WayfarerError::RoutingViolation {
                node: node.id().to_string(),
                target: target.to_string(),
            });
        }
    }
    Ok(())
}

/// Record a validated decision and pick the next node.
fn apply_decision(
    state: &mut ConversationState,
    from: AdvisorId,
    decision: RouteDecision,
    sink: &EventSink,
) -> NodeId {
    let RouteDecision {
        response_text,
        next,
        mut requested_tools,
    } = decision;

    for req in requested_tools.iter_mut().filter(|r| r.call_id.is_none()) {
        req.call_id = Some(format!("call_{}", Uuid::new_v4().simple()));
    }
    if !response_text.is_empty() || !requested_tools.is_empty() {
        state.append(Message::assistant(from.as_str(), response_text, requested_tools.clone()));
    }

    if !requested_tools.is_empty() {
        state.pending_tool_request = Some(requested_tools);
        return NodeId::ToolStage;
    }

    match next {
        Route::Finish => NodeId::Human,
        Route::Advisor(to) => {
            if to != from {
                info!(from = %from, to = %to, "Handing off");
                sink.publish(TurnEvent::Data(DataItem::new(
                    to.transfer_kind(),
                    json!({ "from": from.as_str(), "to": to.as_str() }),
                )));
            }
            NodeId::Advisor(to)
        }
    }
}
