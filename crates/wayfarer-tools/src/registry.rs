use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info};

use wayfarer_core::config::ToolsConfig;
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::traits::Tool;
use wayfarer_core::types::{ToolContext, ToolDefinition, ToolOutput};

use crate::builtin::{geo, image_search, tripadvisor, web_search};

/// Flat name → adapter registry. Built once at startup and shared read-only.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, tool: impl Tool) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Definitions for the named tools, skipping names that are not registered.
    pub fn definitions_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name under its own timeout. A panicking adapter is
    /// reported as a `ToolExecution` error.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| WayfarerError::ToolNotFound(name.to_string()))?;

        let timeout = Duration::from_secs(tool.timeout_secs());
        let run = AssertUnwindSafe(async { tool.execute(input, ctx).await }).catch_unwind();
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(tool = %name, message = %message, "Tool panicked");
                Err(WayfarerError::ToolExecution {
                    tool: name.to_string(),
                    message: format!("tool panicked: {}", message),
                })
            }
            Err(_) => Err(WayfarerError::ToolTimeout {
                tool: name.to_string(),
                timeout_secs: tool.timeout_secs(),
            }),
        }
    }

    /// Registry with every adapter the config has credentials for.
    ///
    /// Open-Meteo and the model-backed search tools need no keys and are
    /// always present. TripAdvisor and Tavily tools are skipped without a key.
    pub fn from_config(config: &ToolsConfig) -> Self {
        let mut registry = Self::new();
        let timeout = config.timeout_secs;
        let http = reqwest::Client::new();

        registry.register(geo::GeocodeTool::new(http.clone(), &config.open_meteo, timeout));
        registry.register(geo::WeatherForecastTool::new(http.clone(), &config.open_meteo, timeout));

        if let Some(ta) = &config.tripadvisor {
            for tool in tripadvisor::all_tools(http.clone(), ta, timeout) {
                registry.register(tool);
            }
        }

        if let Some(tavily) = &config.tavily {
            registry.register(image_search::ImageSearchTool::new(http.clone(), tavily, timeout));
            registry.register(web_search::WebSearchExecuteTool::new(http.clone(), tavily, timeout));
        }
        registry.register(web_search::WebSearchQueryTool::new(timeout));
        registry.register(web_search::WebSearchSummarizeTool::new(http, timeout * 2));

        info!(tools = ?registry.list(), "Tool registry built");
        registry
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
