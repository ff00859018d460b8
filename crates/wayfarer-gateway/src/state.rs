use std::sync::Arc;

use wayfarer_agent::GraphEngine;
use wayfarer_core::config::GatewayConfig;
use wayfarer_core::traits::CheckpointStore;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub engine: Arc<GraphEngine>,
    pub store: Arc<dyn CheckpointStore>,
}

impl AppState {
    pub fn new(config: GatewayConfig, engine: Arc<GraphEngine>) -> Self {
        let store = engine.context().store.clone();
        Self {
            config,
            engine,
            store,
        }
    }
}
