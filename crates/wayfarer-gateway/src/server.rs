use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use wayfarer_agent::GraphEngine;
use wayfarer_core::config::GatewayConfig;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    engine: Arc<GraphEngine>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, engine: Arc<GraphEngine>) -> Self {
        Self { config, engine }
    }

    pub fn router(&self) -> Router {
        router(Arc::new(AppState::new(self.config.clone(), self.engine.clone())))
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/chat", post(routes::chat))
        .route("/api/threads", get(routes::list_threads))
        .route(
            "/api/threads/{id}",
            get(routes::thread_latest).delete(routes::delete_thread),
        )
        .route("/api/threads/{id}/checkpoints", get(routes::thread_checkpoints))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
