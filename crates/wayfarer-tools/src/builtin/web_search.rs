//! Three-step web research: write queries, run them, summarize the hits.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use wayfarer_core::config::{ModelConfig, TavilyConfig};
use wayfarer_core::error::Result;
use wayfarer_core::event::DataItemKind;
use wayfarer_core::traits::{LlmClient, Tool};
use wayfarer_core::types::{Message, ToolContext, ToolOutput};

use super::{parse_input, send_json, strip_html, tool_err, truncate};

const MAX_QUERIES: usize = 3;
const MAX_PAGE_CHARS: usize = 8_000;

fn model_from<'a>(tool: &str, ctx: &'a ToolContext) -> Result<(&'a Arc<dyn LlmClient>, &'a ModelConfig)> {
    match (&ctx.llm, &ctx.model) {
        (Some(llm), Some(model)) => Ok((llm, model)),
        _ => Err(tool_err(tool, "no language model available")),
    }
}

/// Pull a list of queries out of model text: a JSON array if present, else one per line.
fn parse_queries(text: &str) -> Vec<String> {
    let from_json = text
        .find('[')
        .zip(text.rfind(']'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| serde_json::from_str::<Vec<String>>(&text[start..=end]).ok());

    let queries = from_json.unwrap_or_else(|| {
        text.lines()
            .map(|l| l.trim().trim_start_matches(['-', '*', '•']).trim())
            .map(|l| l.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.').trim())
            .map(|l| l.trim_matches('"').to_string())
            .collect()
    });

    queries
        .into_iter()
        .filter(|q| !q.is_empty())
        .take(MAX_QUERIES)
        .collect()
}

pub struct WebSearchQueryTool {
    timeout: u64,
}

impl WebSearchQueryTool {
    pub fn new(timeout: u64) -> Self {
        Self { timeout }
    }
}

#[derive(Deserialize)]
struct QueryInput {
    interest: String,
}

impl Tool for WebSearchQueryTool {
    fn name(&self) -> &str {
        "webSearchQuery"
    }

    fn description(&self) -> &str {
        "Turn a traveller's interest into a few focused web search queries."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "interest": { "type": "string", "description": "What the traveller wants to learn about" }
            },
            "required": ["interest"]
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    fn data_item(&self) -> Option<DataItemKind> {
        Some(DataItemKind::SearchQuery)
    }

    fn execute(&self, input: Value, ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            let params: QueryInput = parse_input(self.name(), input)?;
            let (llm, model) = model_from(self.name(), &ctx)?;

            let text = wayfarer_llm::complete_text(
                llm.as_ref(),
                model,
                vec![
                    Message::system(format!(
                        "You write web search queries for travel research. Reply with a JSON array \
                         of at most {} short search queries and nothing else.",
                        MAX_QUERIES
                    )),
                    Message::user(params.interest.clone()),
                ],
            )
            .await?;

            let queries = parse_queries(&text);
            if queries.is_empty() {
                return Err(tool_err(self.name(), "model produced no queries"));
            }
            Ok(ToolOutput::success(json!({
                "interest": params.interest,
                "queries": queries,
            })))
        })
    }
}

pub struct WebSearchExecuteTool {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_results: u32,
    timeout: u64,
}

impl WebSearchExecuteTool {
    pub fn new(http: reqwest::Client, config: &TavilyConfig, timeout: u64) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
            timeout,
        }
    }

    async fn run_query(&self, query: &str) -> Result<Vec<Value>> {
        let body = send_json(
            self.name(),
            self.http
                .post(format!("{}/search", self.base_url.trim_end_matches('/')))
                .bearer_auth(&self.api_key)
                .json(&json!({ "query": query, "max_results": self.max_results })),
        )
        .await?;

        Ok(body["results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|r| {
                        json!({
                            "query": query,
                            "url": r["url"],
                            "title": r["title"],
                            "snippet": r["content"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Deserialize)]
struct ExecuteInput {
    queries: Vec<String>,
}

impl Tool for WebSearchExecuteTool {
    fn name(&self) -> &str {
        "webSearchExecute"
    }

    fn description(&self) -> &str {
        "Run web search queries and return the matching pages."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "queries": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["queries"]
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    fn data_item(&self) -> Option<DataItemKind> {
        Some(DataItemKind::SearchExecution)
    }

    fn execute(&self, input: Value, _ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            let params: ExecuteInput = parse_input(self.name(), input)?;

            let mut seen = HashSet::new();
            let mut results = Vec::new();
            for query in params.queries.iter().take(MAX_QUERIES) {
                for hit in self.run_query(query).await? {
                    let url = hit["url"].as_str().unwrap_or_default().to_string();
                    if !url.is_empty() && seen.insert(url) {
                        results.push(hit);
                    }
                }
            }
            debug!(queries = params.queries.len(), hits = results.len(), "Web search done");
            Ok(ToolOutput::success(json!({ "results": results })))
        })
    }
}

pub struct WebSearchSummarizeTool {
    http: reqwest::Client,
    timeout: u64,
}

impl WebSearchSummarizeTool {
    pub fn new(http: reqwest::Client, timeout: u64) -> Self {
        Self { http, timeout }
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| tool_err(self.name(), format!("fetch {}: {}", url, e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(tool_err(self.name(), format!("fetch {}: HTTP {}", url, status.as_u16())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| tool_err(self.name(), e.to_string()))?;
        Ok(truncate(&strip_html(&body)?, MAX_PAGE_CHARS))
    }

    async fn summarize(&self, url: &str, llm: &dyn LlmClient, model: &ModelConfig) -> Result<String> {
        let page = self.fetch_text(url).await?;
        wayfarer_llm::complete_text(
            llm,
            model,
            vec![
                Message::system(
                    "Summarize this web page for a traveller in three to five sentences. \
                     Keep concrete facts such as opening hours, prices and locations.",
                ),
                Message::user(page),
            ],
        )
        .await
    }
}

#[derive(Deserialize)]
struct SummarizeInput {
    urls: Vec<String>,
}

impl Tool for WebSearchSummarizeTool {
    fn name(&self) -> &str {
        "webSearchSummarize"
    }

    fn description(&self) -> &str {
        "Read web pages and summarize what they say for the traveller."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "urls": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["urls"]
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }

    fn data_item(&self) -> Option<DataItemKind> {
        Some(DataItemKind::SearchSummary)
    }

    fn execute(&self, input: Value, ctx: ToolContext) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            let params: SummarizeInput = parse_input(self.name(), input)?;
            let (llm, model) = model_from(self.name(), &ctx)?;

            // One failing page does not sink the batch.
            let summaries: Vec<Value> = stream::iter(params.urls)
                .map(|url| async move {
                    match self.summarize(&url, llm.as_ref(), model).await {
                        Ok(summary) => json!({ "url": url, "summary": summary }),
                        Err(e) => {
                            warn!(url = %url, error = %e, "Page summary failed");
                            json!({ "url": url, "error": e.to_string() })
                        }
                    }
                })
                .buffered(3)
                .collect()
                .await;

            if summaries.iter().all(|s| s.get("error").is_some()) {
                return Err(tool_err(self.name(), "no page could be summarized"));
            }
            Ok(ToolOutput::success(json!({ "summaries": summaries })))
        })
    }
}
