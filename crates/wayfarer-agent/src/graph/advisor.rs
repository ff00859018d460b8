use std::collections::BTreeMap;

use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use wayfarer_core::config::AppConfig;
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::event::TurnEvent;
use wayfarer_core::state::{AdvisorId, ConversationState, NodeId, Route, RouteDecision};
use wayfarer_core::types::{Message, StreamDelta, ToolDefinition, ToolRequest};

use super::context::TurnContext;
use super::node::{GraphNode, NodeOutcome};

/// Name of the function the model calls to pick the next speaker.
pub const ROUTE_TOOL: &str = "route";

/// Static description of one advisor persona.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDescriptor {
    pub id: AdvisorId,
    /// Prompt template; `{name}`, `{destinations}` and `{tools}` are substituted.
    pub system_prompt: String,
    pub destinations: Vec<AdvisorId>,
    pub tools: Vec<String>,
}

impl AgentDescriptor {
    pub fn new(id: AdvisorId, system_prompt: impl Into<String>) -> Self {
        Self {
            id,
            system_prompt: system_prompt.into(),
            destinations: AdvisorId::ALL.iter().copied().filter(|a| *a != id).collect(),
            tools: vec![],
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_destinations(mut self, destinations: Vec<AdvisorId>) -> Self {
        self.destinations = destinations;
        self
    }

    pub fn allows_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t == name)
    }

    pub fn render_prompt(&self) -> String {
        let destinations = self
            .destinations
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let tools = if self.tools.is_empty() {
            "none".to_string()
        } else {
            self.tools.join(", ")
        };
        self.system_prompt
            .replace("{name}", self.id.as_str())
            .replace("{destinations}", &destinations)
            .replace("{tools}", &tools)
    }
}

const ROUTING_RULES: &str = "\n\nYou are {name}, one advisor in a team. Colleagues you can hand the \
conversation to: {destinations}. Your tools: {tools}.\n\
When your reply is complete, call the `route` function exactly once with `nextNode` set to a \
colleague's name if they should take over, or to \"finish\" to hand the conversation back to the \
traveller. Never tell the traveller you are transferring them; just route.";

/// The four stock personas.
pub fn default_advisors() -> Vec<AgentDescriptor> {
    let persona = |text: &str| format!("{}{}", text, ROUTING_RULES);
    vec![
        AgentDescriptor::new(
            AdvisorId::TravelAdvisor,
            persona(
                "You are a friendly general travel advisor. Help travellers pick destinations, \
                 plan itineraries and understand what a place is like. Show pictures with \
                 imageSearch and research specifics with the web search tools \
                 (webSearchQuery, then webSearchExecute, then webSearchSummarize).",
            ),
        )
        .with_tools(&[
            "imageSearch",
            "webSearchQuery",
            "webSearchExecute",
            "webSearchSummarize",
        ]),
        AgentDescriptor::new(
            AdvisorId::WeatherAdvisor,
            persona(
                "You are a weather advisor. Geocode the destination, fetch the forecast and \
                 explain what it means for the trip: what to pack and which days suit outdoor \
                 plans. The traveller already sees the forecast card, so do not repeat raw numbers.",
            ),
        )
        .with_tools(&["geocode", "weatherForecast"]),
        AgentDescriptor::new(
            AdvisorId::HotelAdvisor,
            persona(
                "You are a hotel advisor. Geocode the destination, search for hotels that match \
                 the traveller's budget and style, and use details and reviews to back up your \
                 recommendations.",
            ),
        )
        .with_tools(&["geocode", "hotelSearch", "hotelDetails", "hotelReviews"]),
        AgentDescriptor::new(
            AdvisorId::SightseeingAdvisor,
            persona(
                "You are a sightseeing advisor. Geocode the destination, find attractions that \
                 fit the traveller's interests and use details and reviews to suggest what to \
                 see and when.",
            ),
        )
        .with_tools(&[
            "geocode",
            "sightseeingSearch",
            "sightseeingDetails",
            "sightseeingReviews",
        ]),
    ]
}

/// Stock personas with `[advisors.<id>]` overrides applied.
pub fn advisors_from_config(config: &AppConfig) -> Vec<AgentDescriptor> {
    default_advisors()
        .into_iter()
        .map(|mut d| {
            if let Some(ov) = config.advisor_override(d.id) {
                if let Some(prompt) = &ov.system_prompt {
                    d.system_prompt = format!("{}{}", prompt, ROUTING_RULES);
                }
                if let Some(tools) = &ov.tools {
                    d.tools = tools.clone();
                }
                if let Some(destinations) = &ov.destinations {
                    d.destinations = destinations.clone();
                }
            }
            d
        })
        .collect()
}

/// LLM-backed advisor persona.
pub struct AdvisorNode {
    descriptor: AgentDescriptor,
    node_id: NodeId,
}

impl AdvisorNode {
    pub fn new(descriptor: AgentDescriptor) -> Self {
        Self {
            node_id: NodeId::Advisor(descriptor.id),
            descriptor,
        }
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn route_definition(&self) -> ToolDefinition {
        let mut targets: Vec<&str> = self.descriptor.destinations.iter().map(|d| d.as_str()).collect();
        targets.push("finish");
        ToolDefinition {
            name: ROUTE_TOOL.to_string(),
            description: "Choose who speaks next. Call exactly once, after your reply.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "nextNode": { "type": "string", "enum": targets }
                },
                "required": ["nextNode"]
            }),
        }
    }
}

#[derive(Default)]
struct CallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

impl GraphNode for AdvisorNode {
    fn id(&self) -> NodeId {
        self.node_id
    }

    fn allowed_destinations(&self) -> &[AdvisorId] {
        &self.descriptor.destinations
    }

    fn run<'a>(
        &'a self,
        state: &'a ConversationState,
        ctx: &'a TurnContext<'a>,
    ) -> BoxFuture<'a, Result<NodeOutcome>> {
        Box::pin(async move {
            let advisor = self.descriptor.id;
            let shared = ctx.shared;

            let mut messages = Vec::with_capacity(state.messages.len() + 1);
            messages.push(Message::system(self.descriptor.render_prompt()));
            messages.extend(state.messages.iter().cloned());

            let mut tool_defs = shared.tools.definitions_for(&self.descriptor.tools);
            tool_defs.push(self.route_definition());

            let mut stream = tokio::select! {
                result = shared.llm.chat_stream(&shared.model, messages, &tool_defs) => result?,
                _ = ctx.cancel.cancelled() => return Err(WayfarerError::Cancelled),
            };

            let mut text = String::new();
            let mut calls: BTreeMap<usize, CallAccumulator> = BTreeMap::new();
            loop {
                let delta = tokio::select! {
                    delta = stream.next() => delta,
                    _ = ctx.cancel.cancelled() => return Err(WayfarerError::Cancelled),
                };
                let Some(delta) = delta else { break };

                match delta? {
                    StreamDelta::TextDelta(chunk) => {
                        ctx.sink.publish(TurnEvent::TextDelta {
                            advisor,
                            text: chunk.clone(),
                        });
                        text.push_str(&chunk);
                    }
                    StreamDelta::ToolUseStart { index, id, name } => {
                        let call = calls.entry(index).or_default();
                        call.id = id;
                        call.name = name;
                    }
                    StreamDelta::ToolInputDelta { index, delta } => {
                        calls.entry(index).or_default().input_json.push_str(&delta);
                    }
                    StreamDelta::Stop(_) | StreamDelta::Usage { .. } => {}
                }
            }

            let decision = parse_decision(advisor, text, calls.into_values())?;
            debug!(
                advisor = %advisor,
                next = %decision.next,
                tools = decision.requested_tools.len(),
                "Advisor decided"
            );
            Ok(NodeOutcome::Route(decision))
        })
    }
}

/// Build a decision from the model's text and function calls.
///
/// No `route` call means the advisor is done and control goes back to the
/// traveller. Tool calls with unparseable arguments are dropped.
fn parse_decision(
    advisor: AdvisorId,
    text: String,
    calls: impl Iterator<Item = CallAccumulator>,
) -> Result<RouteDecision> {
    let schema_err = |message: String| WayfarerError::DecisionSchema {
        node: advisor.to_string(),
        message,
    };

    let mut next = None;
    let mut requested = Vec::new();
    for call in calls {
        if call.name == ROUTE_TOOL {
            if next.is_some() {
                return Err(schema_err("more than one route call".into()));
            }
            let args: Value = serde_json::from_str(&call.input_json)
                .map_err(|e| schema_err(format!("route arguments are not JSON: {}", e)))?;
            let target = args
                .get("nextNode")
                .and_then(Value::as_str)
                .ok_or_else(|| schema_err("route call is missing nextNode".into()))?;
            next = Some(target.parse::<Route>().map_err(schema_err)?);
            continue;
        }

        let args = if call.input_json.trim().is_empty() {
            Ok(json!({}))
        } else {
            serde_json::from_str::<Value>(&call.input_json)
        };
        match args {
            Ok(args) => requested.push(ToolRequest {
                call_id: (!call.id.is_empty()).then_some(call.id),
                tool_name: call.name,
                args,
            }),
            Err(e) => warn!(
                advisor = %advisor,
                tool = %call.name,
                error = %e,
                "Dropping tool call with unparseable arguments"
            ),
        }
    }

    Ok(RouteDecision {
        response_text: text,
        next: next.unwrap_or(Route::Finish),
        requested_tools: requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, input: &str) -> CallAccumulator {
        CallAccumulator {
            id: format!("id_{}", name),
            name: name.to_string(),
            input_json: input.to_string(),
        }
    }

    #[test]
    fn test_render_prompt_substitutes_placeholders() {
        let d = AgentDescriptor::new(AdvisorId::HotelAdvisor, "I am {name}; ask {destinations}; use {tools}.")
            .with_tools(&["geocode", "hotelSearch"])
            .with_destinations(vec![AdvisorId::TravelAdvisor]);
        assert_eq!(
            d.render_prompt(),
            "I am hotelAdvisor; ask travelAdvisor; use geocode, hotelSearch."
        );
    }

    #[test]
    fn test_default_advisors_route_to_each_other() {
        let advisors = default_advisors();
        assert_eq!(advisors.len(), 4);
        for a in &advisors {
            assert_eq!(a.destinations.len(), 3);
            assert!(!a.destinations.contains(&a.id));
            assert!(!a.tools.is_empty());
        }
    }

    #[test]
    fn test_config_override_replaces_tools_and_destinations() {
        let config = AppConfig::from_toml(
            r#"
[model]
model_id = "m"

[advisors.weatherAdvisor]
tools = ["weatherForecast"]
destinations = ["travelAdvisor"]
"#,
        )
        .unwrap();
        let weather = advisors_from_config(&config)
            .into_iter()
            .find(|a| a.id == AdvisorId::WeatherAdvisor)
            .unwrap();
        assert_eq!(weather.tools, vec!["weatherForecast"]);
        assert_eq!(weather.destinations, vec![AdvisorId::TravelAdvisor]);
    }

    #[test]
    fn test_parse_route_and_tools() {
        let decision = parse_decision(
            AdvisorId::WeatherAdvisor,
            "Let me check.".into(),
            vec![
                call("weatherForecast", r#"{"lat":1,"long":2}"#),
                call("route", r#"{"nextNode":"hotelAdvisor"}"#),
            ]
            .into_iter(),
        )
        .unwrap();
        assert_eq!(decision.next, Route::Advisor(AdvisorId::HotelAdvisor));
        assert_eq!(decision.requested_tools.len(), 1);
        assert_eq!(decision.requested_tools[0].call_id.as_deref(), Some("id_weatherForecast"));
    }

    #[test]
    fn test_missing_route_means_finish() {
        let decision =
            parse_decision(AdvisorId::TravelAdvisor, "Bye".into(), std::iter::empty()).unwrap();
        assert_eq!(decision.next, Route::Finish);
    }

    #[test]
    fn test_bad_route_calls_are_schema_errors() {
        let cases = [
            vec![call("route", "{not json")],
            vec![call("route", r#"{"target":"finish"}"#)],
            vec![call("route", r#"{"nextNode":"flightAdvisor"}"#)],
            vec![
                call("route", r#"{"nextNode":"finish"}"#),
                call("route", r#"{"nextNode":"finish"}"#),
            ],
        ];
        for calls in cases {
            let err = parse_decision(AdvisorId::HotelAdvisor, String::new(), calls.into_iter())
                .unwrap_err();
            assert!(matches!(err, WayfarerError::DecisionSchema { .. }), "{err}");
        }
    }

    #[test]
    fn test_unparseable_tool_args_dropped() {
        let decision = parse_decision(
            AdvisorId::HotelAdvisor,
            String::new(),
            vec![call("hotelSearch", "{\"lat\":"), call("geocode", "")].into_iter(),
        )
        .unwrap();
        assert_eq!(decision.requested_tools.len(), 1);
        assert_eq!(decision.requested_tools[0].tool_name, "geocode");
        assert_eq!(decision.requested_tools[0].args, json!({}));
    }
}
