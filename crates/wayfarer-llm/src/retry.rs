use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tracing::{info, warn};

use wayfarer_core::config::{ModelConfig, RetryConfig};
use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::traits::LlmClient;
use wayfarer_core::types::*;

/// Wraps a client with exponential backoff and an ordered list of fallback models.
///
/// Only stream establishment is retried. Once deltas are flowing, a failure
/// surfaces to the caller unchanged.
pub struct RetryingClient {
    primary: Arc<dyn LlmClient>,
    fallbacks: Vec<(ModelConfig, Arc<dyn LlmClient>)>,
    retry: RetryConfig,
}

impl RetryingClient {
    pub fn new(
        primary: Arc<dyn LlmClient>,
        fallbacks: Vec<(ModelConfig, Arc<dyn LlmClient>)>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry,
        }
    }
}

fn is_retryable(e: &WayfarerError) -> bool {
    match e {
        WayfarerError::LlmRequest(msg) => {
            const TRANSIENT: [&str; 6] = ["HTTP 429", "HTTP 500", "HTTP 502", "HTTP 503", "timed out", "connect"];
            TRANSIENT.iter().any(|marker| msg.contains(marker))
        }
        WayfarerError::LlmStream(_) => true,
        _ => false,
    }
}

fn backoff_for(attempt: u32, retry: &RetryConfig) -> Duration {
    let base = retry
        .initial_backoff_ms
        .saturating_mul(1u64 << attempt.min(16))
        .min(retry.max_backoff_ms);
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((base as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let max_retries = self.retry.max_retries;
            let mut attempt = 0;
            let last_err = loop {
                match self.primary.chat_stream(&config, messages.clone(), &tools).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) if is_retryable(&e) && attempt < max_retries => {
                        let backoff = backoff_for(attempt, &self.retry);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying LLM request"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    Err(e) => break e,
                }
            };

            for (fb_config, fb_client) in &self.fallbacks {
                match fb_client.chat_stream(fb_config, messages.clone(), &tools).await {
                    Ok(stream) => {
                        info!(model = %fb_config.model_id, "Fell back to alternative model");
                        return Ok(stream);
                    }
                    Err(e) => warn!(model = %fb_config.model_id, error = %e, "Fallback model failed"),
                }
            }

            Err(last_err)
        })
    }
}
