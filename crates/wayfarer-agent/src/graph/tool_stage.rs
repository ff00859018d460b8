use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, warn};

use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::event::{DataItem, TurnEvent};
use wayfarer_core::types::{Message, ToolContext, ToolOutput, ToolRequest};

use super::advisor::AgentDescriptor;
use super::context::TurnContext;

/// Executes an advisor's requested tools and turns the results into messages.
///
/// Tools run concurrently up to `concurrency`. Results are appended in
/// request order once every tool has finished; data items are published the
/// moment their tool completes.
pub struct ToolStage {
    concurrency: usize,
}

impl ToolStage {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(
        &self,
        advisor: &AgentDescriptor,
        requests: Vec<ToolRequest>,
        ctx: &TurnContext<'_>,
    ) -> Result<Vec<Message>> {
        let registry = &ctx.shared.tools;
        let accepted: Vec<ToolRequest> = requests
            .into_iter()
            .filter(|req| {
                let reason = if !registry.contains(&req.tool_name) {
                    "unknown tool"
                } else if !advisor.allows_tool(&req.tool_name) {
                    "not available to this advisor"
                } else {
                    return true;
                };
                warn!(advisor = %advisor.id, tool = %req.tool_name, reason, "Dropping requested tool");
                ctx.sink.publish(TurnEvent::ToolDropped {
                    tool: req.tool_name.clone(),
                    reason: reason.to_string(),
                });
                false
            })
            .collect();

        if accepted.is_empty() {
            return Ok(vec![]);
        }

        let tool_ctx = ToolContext::new(ctx.thread_id.clone())
            .with_llm(ctx.shared.llm.clone(), ctx.shared.model.clone());

        let runs = stream::iter(accepted.into_iter().enumerate())
            .map(|(i, req)| {
                let tool_ctx = tool_ctx.clone();
                async move {
                    let result = registry
                        .execute(&req.tool_name, req.args.clone(), tool_ctx)
                        .await;
                    if let Ok(output) = &result {
                        publish_data_item(ctx, &req, output);
                    }
                    (i, req, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>();

        let mut finished = tokio::select! {
            finished = runs => finished,
            _ = ctx.cancel.cancelled() => return Err(WayfarerError::Cancelled),
        };
        finished.sort_by_key(|(i, _, _)| *i);

        Ok(finished
            .into_iter()
            .map(|(_, req, result)| to_message(&req, result))
            .collect())
    }
}

fn publish_data_item(ctx: &TurnContext<'_>, req: &ToolRequest, output: &ToolOutput) {
    if output.is_error {
        return;
    }
    let Some(kind) = ctx
        .shared
        .tools
        .get(&req.tool_name)
        .and_then(|tool| tool.data_item())
    else {
        return;
    };
    debug!(tool = %req.tool_name, kind = kind.as_str(), "Publishing tool data item");
    ctx.sink
        .publish(TurnEvent::Data(DataItem::new(kind, output.content.clone())));
}

fn to_message(req: &ToolRequest, result: Result<ToolOutput>) -> Message {
    match result {
        Ok(output) if !output.is_error => Message::tool_data(
            req,
            json!({
                "tool": req.tool_name,
                "args": req.args,
                "result": output.content,
                "artifact": output.artifact,
            }),
        ),
        Ok(output) => {
            let detail = match output.content {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            warn!(tool = %req.tool_name, error = %detail, "Tool reported an error");
            Message::tool_error(req, format!("Error running {}: {}", req.tool_name, detail))
        }
        Err(e) => {
            warn!(tool = %req.tool_name, error = %e, "Tool failed");
            let detail = match e {
                WayfarerError::ToolExecution { message, .. } => message,
                WayfarerError::ToolTimeout { timeout_secs, .. } => {
                    format!("timed out after {}s", timeout_secs)
                }
                other => other.to_string(),
            };
            Message::tool_error(req, format!("Error running {}: {}", req.tool_name, detail))
        }
    }
}
