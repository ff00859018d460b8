pub mod providers;
pub mod retry;
pub mod streaming;

use std::sync::Arc;

use futures::StreamExt;

use wayfarer_core::config::{AppConfig, ModelConfig};
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::traits::LlmClient;
use wayfarer_core::types::{Message, StreamDelta};

pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create a client for a single model. Every provider speaks the
/// OpenAI-compatible chat completions protocol.
pub fn create_client(_config: &ModelConfig) -> Arc<dyn LlmClient> {
    Arc::new(OpenAiClient::new())
}

/// Build the client used by the graph: primary model plus fallbacks, wrapped
/// in retry when the primary model configures it.
pub fn build_client(config: &AppConfig) -> Arc<dyn LlmClient> {
    let primary = create_client(&config.model);
    let Some(retry) = config.model.retry.clone() else {
        return primary;
    };
    let fallbacks = config
        .fallback_models
        .iter()
        .map(|m| (m.clone(), create_client(m)))
        .collect();
    Arc::new(RetryingClient::new(primary, fallbacks, retry))
}

/// Run a tool-less completion and collect the streamed text.
pub async fn complete_text(
    llm: &dyn LlmClient,
    config: &ModelConfig,
    messages: Vec<Message>,
) -> Result<String> {
    let mut stream = llm.chat_stream(config, messages, &[]).await?;
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        if let StreamDelta::TextDelta(chunk) = delta? {
            text.push_str(&chunk);
        }
    }
    if text.trim().is_empty() {
        return Err(WayfarerError::LlmParse("model returned no text".into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_test_utils::{test_model_config, ScriptedLlm};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_text_joins_deltas() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::text_turn(&["Bon", "jour"])]);
        let text = complete_text(&llm, &test_model_config(), vec![Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(text, "Bonjour");
    }

    #[tokio::test]
    async fn test_complete_text_rejects_empty() {
        let llm = ScriptedLlm::new(vec![ScriptedLlm::text_turn(&[])]);
        let err = complete_text(&llm, &test_model_config(), vec![]).await.unwrap_err();
        assert!(matches!(err, WayfarerError::LlmParse(_)));
    }

    #[tokio::test]
    async fn test_openai_client_streams_over_http() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"traveller\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let mut config = test_model_config();
        config.api_key = Some("sk-test".into());
        config.base_url = Some(format!("{}/v1/chat/completions", server.uri()));

        let client = create_client(&config);
        let text = complete_text(client.as_ref(), &config, vec![Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(text, "Hello traveller");
    }

    #[tokio::test]
    async fn test_openai_client_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let mut config = test_model_config();
        config.base_url = Some(server.uri());
        let err = OpenAiClient::new()
            .chat_stream(&config, vec![], &[])
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("HTTP 429"));
    }
}
