use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::header::{self, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use wayfarer_agent::frame_stream;
use wayfarer_core::error::WayfarerError;
use wayfarer_core::event::EventSink;
use wayfarer_core::state::Checkpoint;
use wayfarer_core::types::ThreadId;

use crate::error::ApiError;
use crate::middleware::Authenticated;
use crate::protocol::ChatRequest;
use crate::state::AppState;

const DATA_STREAM_HEADER: HeaderName = HeaderName::from_static("x-vercel-ai-data-stream");

// GET /api/health (no auth)
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /api/chat: run one turn and stream it back
pub async fn chat(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = serde_json::from_slice::<ChatRequest>(&body)
        .map_err(WayfarerError::from)?
        .into_turn_request()?;
    let thread_id = request.thread_id.clone();

    // Busy, unknown and store failures surface here as a status code.
    let turn = state.engine.begin(request).await?;
    info!(thread_id = %thread_id, "Streaming turn");

    let (sink, rx) = EventSink::channel();
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    tokio::spawn(async move {
        // Failures are logged and streamed as an error frame by the turn.
        let _ = turn.run(sink, cancel).await;
    });

    // Dropping the body (client gone) cancels the turn.
    let frames = frame_stream(rx).map(move |frame| {
        let _cancel_on_drop = &guard;
        Ok::<_, Infallible>(frame)
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (DATA_STREAM_HEADER, "v1"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

// GET /api/threads?limit=50
pub async fn list_threads(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let threads = state.store.list_threads(q.limit).await?;
    Ok(Json(json!({ "threads": threads })))
}

// GET /api/threads/{id}
pub async fn thread_latest(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Checkpoint>, ApiError> {
    let thread_id = ThreadId::from_string(&id);
    let checkpoint = state
        .store
        .load_latest(&thread_id)
        .await?
        .ok_or(WayfarerError::ThreadNotFound(id))?;
    Ok(Json(checkpoint))
}

// GET /api/threads/{id}/checkpoints
pub async fn thread_checkpoints(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let thread_id = ThreadId::from_string(&id);
    let history = state.store.history(&thread_id).await?;
    if history.is_empty() {
        return Err(WayfarerError::ThreadNotFound(id).into());
    }
    debug!(thread_id = %thread_id, count = history.len(), "Serving checkpoint history");
    Ok(Json(json!({
        "threadId": thread_id,
        "checkpoints": history,
    })))
}

// DELETE /api/threads/{id}
pub async fn delete_thread(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let thread_id = ThreadId::from_string(&id);
    // Holding the lane keeps a turn from starting mid-delete.
    let _lane = state.engine.lanes().try_acquire(&thread_id)?;
    let deleted = state.store.delete_thread(&thread_id).await?;
    if deleted == 0 {
        return Err(WayfarerError::ThreadNotFound(id).into());
    }
    info!(thread_id = %thread_id, deleted, "Thread deleted");
    Ok(Json(json!({ "deleted": deleted })))
}
