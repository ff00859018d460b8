use std::io::Write;

use wayfarer_core::config::{AppConfig, StoreBackend};
use wayfarer_core::state::AdvisorId;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "openai"
model_id = "gpt-4o"
api_key = "sk-test-key"
max_tokens = 2048
temperature = 0.3

[model.retry]
max_retries = 2
initial_backoff_ms = 100
max_backoff_ms = 1000

[[fallback_models]]
model_id = "gpt-4o-mini"

[graph]
entry_node = "travelAdvisor"
max_steps_per_turn = 12
tool_concurrency = 2
human_prompt = "Your turn"

[store]
backend = "sqlite"
path = "/tmp/wayfarer-test/checkpoints.db"

[gateway]
bind = "0.0.0.0:9999"
token = "test-token"

[tools]
timeout_secs = 20

[tools.tripadvisor]
api_key = "ta-key"

[tools.tavily]
api_key = "tv-key"
max_results = 3

[advisors.hotelAdvisor]
tools = ["geocode", "hotelSearch"]
destinations = ["travelAdvisor"]
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.model_id, "gpt-4o");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 2048);
    assert_eq!(config.model.retry.as_ref().map(|r| r.max_retries), Some(2));
    assert_eq!(config.fallback_models.len(), 1);

    assert_eq!(config.graph.entry_node, AdvisorId::TravelAdvisor);
    assert_eq!(config.graph.max_steps_per_turn, 12);
    assert_eq!(config.graph.tool_concurrency, 2);
    assert_eq!(config.graph.human_prompt, "Your turn");

    assert_eq!(config.store.backend, StoreBackend::Sqlite);

    let gw = config.gateway.expect("gateway present");
    assert_eq!(gw.bind, "0.0.0.0:9999");
    assert_eq!(gw.token.as_deref(), Some("test-token"));

    assert_eq!(config.tools.timeout_secs, 20);
    assert_eq!(config.tools.tripadvisor.expect("tripadvisor").api_key, "ta-key");
    assert_eq!(config.tools.tavily.expect("tavily").max_results, 3);

    let hotel = config.advisors.get("hotelAdvisor").expect("hotel override");
    assert_eq!(hotel.destinations, Some(vec![AdvisorId::TravelAdvisor]));
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("WAYFARER_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[model]
model_id = "test-model"
api_key = "${WAYFARER_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("WAYFARER_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
model_id = "llama3.2"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.graph.entry_node, AdvisorId::TravelAdvisor);
    assert_eq!(config.graph.max_steps_per_turn, 25);
    assert_eq!(config.graph.tool_concurrency, 4);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert!(config.gateway.is_none());
    assert!(config.tools.tripadvisor.is_none());
    assert!(config.tools.tavily.is_none());
    assert!(config.advisors.is_empty());
}

#[test]
fn test_missing_file_is_config_not_found() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/wayfarer.toml")).unwrap_err();
    assert!(matches!(
        err,
        wayfarer_core::WayfarerError::ConfigNotFound(_)
    ));
}
