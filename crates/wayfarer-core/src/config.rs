use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, WayfarerError};
use crate::state::AdvisorId;

/// Top-level Wayfarer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Per-advisor overrides keyed by advisor id (e.g. `[advisors.hotelAdvisor]`).
    #[serde(default)]
    pub advisors: HashMap<String, AdvisorOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_provider() -> String { "openai".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Routing graph configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Advisor that receives control on a fresh thread.
    #[serde(default = "default_entry_node")]
    pub entry_node: AdvisorId,
    /// Node steps allowed in one turn before it is aborted.
    #[serde(default = "default_max_steps")]
    pub max_steps_per_turn: usize,
    /// Maximum tools executed concurrently by the tool stage.
    #[serde(default = "default_tool_concurrency")]
    pub tool_concurrency: usize,
    /// System message that opens every fresh thread.
    #[serde(default = "default_intro_message")]
    pub intro_message: String,
    /// Prompt recorded when the graph suspends for human input.
    #[serde(default = "default_human_prompt")]
    pub human_prompt: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            entry_node: default_entry_node(),
            max_steps_per_turn: default_max_steps(),
            tool_concurrency: default_tool_concurrency(),
            intro_message: default_intro_message(),
            human_prompt: default_human_prompt(),
        }
    }
}

fn default_entry_node() -> AdvisorId { AdvisorId::TravelAdvisor }
fn default_max_steps() -> usize { 25 }
fn default_tool_concurrency() -> usize { 4 }
fn default_intro_message() -> String {
    "A new traveller has joined. Greet them, introduce the team of advisors \
     (travel, weather, hotels, sightseeing) and ask where they would like to go."
        .to_string()
}
fn default_human_prompt() -> String {
    "Waiting for the traveller's next message.".to_string()
}

/// Which checkpoint backend to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String { "~/.wayfarer/checkpoints.db".to_string() }

impl StoreConfig {
    /// Resolve the database path (expand ~).
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on every route except health.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            token: None,
        }
    }
}

fn default_bind() -> String { "127.0.0.1:18790".to_string() }

/// Tool adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub open_meteo: OpenMeteoConfig,
    #[serde(default)]
    pub tripadvisor: Option<TripAdvisorConfig>,
    #[serde(default)]
    pub tavily: Option<TavilyConfig>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            open_meteo: OpenMeteoConfig::default(),
            tripadvisor: None,
            tavily: None,
        }
    }
}

fn default_tool_timeout() -> u64 { 30 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoConfig {
    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            geocode_url: default_geocode_url(),
            forecast_url: default_forecast_url(),
            forecast_days: default_forecast_days(),
        }
    }
}

fn default_geocode_url() -> String { "https://geocoding-api.open-meteo.com/v1/search".to_string() }
fn default_forecast_url() -> String { "https://api.open-meteo.com/v1/forecast".to_string() }
fn default_forecast_days() -> u8 { 7 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripAdvisorConfig {
    pub api_key: String,
    #[serde(default = "default_tripadvisor_url")]
    pub base_url: String,
    /// Search radius unit sent with nearby searches.
    #[serde(default = "default_radius_unit")]
    pub radius_unit: String,
}

fn default_tripadvisor_url() -> String { "https://api.content.tripadvisor.com/api/v1".to_string() }
fn default_radius_unit() -> String { "km".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilyConfig {
    pub api_key: String,
    #[serde(default = "default_tavily_url")]
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_tavily_url() -> String { "https://api.tavily.com".to_string() }
fn default_max_results() -> u32 { 5 }

/// Optional overrides for a built-in advisor persona.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorOverride {
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub destinations: Option<Vec<AdvisorId>>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| WayfarerError::ConfigNotFound(path.display().to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn from_toml(content: &str) -> Result<Self> {
        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| WayfarerError::Config(e.to_string()))?;
        config.validate()?;
        debug!(
            model = %config.model.model_id,
            entry = %config.graph.entry_node,
            advisors = config.advisors.len(),
            "Config loaded"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.graph.max_steps_per_turn == 0 {
            return Err(WayfarerError::Config(
                "graph.max_steps_per_turn must be at least 1".into(),
            ));
        }
        for key in self.advisors.keys() {
            key.parse::<AdvisorId>()
                .map_err(|e| WayfarerError::Config(format!("[advisors.{}]: {}", key, e)))?;
        }
        if self.graph.tool_concurrency == 0 {
            return Err(WayfarerError::Config(
                "graph.tool_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Override for a given advisor, if configured.
    pub fn advisor_override(&self, advisor: AdvisorId) -> Option<&AdvisorOverride> {
        self.advisors
            .iter()
            .find(|(key, _)| key.parse::<AdvisorId>().ok() == Some(advisor))
            .map(|(_, v)| v)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    warn!(var = %var_name, "Config references an unset environment variable");
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var("HOME").ok().map(PathBuf::from) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_WAYFARER_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_WAYFARER_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_WAYFARER_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_WAYFARER_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_WAYFARER_VAR}\"");
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4o-mini"
"#,
        )
        .unwrap();
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.graph.entry_node, AdvisorId::TravelAdvisor);
        assert_eq!(config.graph.max_steps_per_turn, 25);
        assert_eq!(config.graph.tool_concurrency, 4);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.tools.timeout_secs, 30);
        assert_eq!(config.tools.open_meteo.forecast_days, 7);
        assert!(config.gateway.is_none());
        assert!(config.advisors.is_empty());
    }

    #[test]
    fn test_advisor_overrides_keyed_by_id() {
        let config = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4o-mini"

[advisors.hotelAdvisor]
destinations = ["sightseeingAdvisor"]
tools = ["geocode", "hotelSearch"]
"#,
        )
        .unwrap();
        let hotel = config.advisor_override(AdvisorId::HotelAdvisor).unwrap();
        assert!(config.advisor_override(AdvisorId::WeatherAdvisor).is_none());
        assert_eq!(
            hotel.destinations.as_deref(),
            Some(&[AdvisorId::SightseeingAdvisor][..])
        );
        assert_eq!(hotel.tools.as_ref().unwrap().len(), 2);
        assert!(hotel.system_prompt.is_none());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4o-mini"

[graph]
tool_concurrency = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, WayfarerError::Config(_)));
    }

    #[test]
    fn test_unknown_entry_node_is_config_error() {
        let err = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4o-mini"

[graph]
entry_node = "flightAdvisor"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, WayfarerError::Config(_)));
    }

    #[test]
    fn test_unknown_advisor_override_rejected() {
        let err = AppConfig::from_toml(
            r#"
[model]
model_id = "gpt-4o-mini"

[advisors.flightAdvisor]
tools = []
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("flightAdvisor"));
    }

    #[test]
    fn test_store_path_expands_home() {
        std::env::set_var("HOME", "/home/traveller");
        let store = StoreConfig::default();
        assert_eq!(
            store.resolved_path(),
            PathBuf::from("/home/traveller/.wayfarer/checkpoints.db")
        );
    }
}
