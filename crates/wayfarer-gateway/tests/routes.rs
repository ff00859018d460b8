use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use wayfarer_agent::{default_advisors, GraphContext, GraphEngine};
use wayfarer_core::config::GatewayConfig;
use wayfarer_core::event::DataItemKind;
use wayfarer_core::traits::{CheckpointStore, LlmClient};
use wayfarer_store::InMemoryCheckpointStore;
use wayfarer_test_utils::{test_config, test_model_config, ScriptedLlm, StubTool};
use wayfarer_tools::ToolRegistry;

fn app(script: Vec<Vec<wayfarer_core::types::StreamDelta>>, token: Option<&str>) -> (Router, Arc<GraphEngine>) {
    let mut tools = ToolRegistry::new();
    tools.register(
        StubTool::new("imageSearch", json!({"summary": "Petra", "images": []}))
            .streamed_as(DataItemKind::SearchSummary),
    );
    tools.register(
        StubTool::new("weatherForecast", forecast()).streamed_as(DataItemKind::Weather),
    );
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
    let ctx = GraphContext {
        llm: Arc::new(ScriptedLlm::new(script)) as Arc<dyn LlmClient>,
        model: test_model_config(),
        tools: Arc::new(tools),
        store,
        graph: test_config().graph,
    };
    let engine = Arc::new(GraphEngine::new(ctx, default_advisors()).unwrap());
    let config = GatewayConfig {
        bind: "127.0.0.1:0".into(),
        token: token.map(str::to_string),
    };
    let router = wayfarer_gateway::router(Arc::new(wayfarer_gateway::AppState::new(
        config,
        engine.clone(),
    )));
    (router, engine)
}

fn forecast() -> Value {
    json!({"days": [{"date": "2026-10-17", "tempMax": 19, "tempMin": 11}]})
}

fn chat_request(body: Value) -> Request<Body> {
    Request::post("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn init_body(session: &str) -> Value {
    json!({
        "sessionId": session,
        "messages": [{"role": "user", "content": "", "data": {"isInitMessage": true}}],
    })
}

fn resume_body(session: &str, text: &str) -> Value {
    json!({
        "sessionId": session,
        "messages": [{"role": "user", "content": text}],
    })
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_needs_no_token() {
    let (app, _) = app(vec![], Some("secret"));
    let response = app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn chat_streams_data_protocol_lines() {
    let script = vec![
        ScriptedLlm::decision(&["Let me ", "look."], &[("imageSearch", json!({"term": "Petra"}))], None),
        ScriptedLlm::decision(&["Here it is!"], &[], Some("finish")),
    ];
    let (app, _) = app(script, None);

    let response = app.oneshot(chat_request(init_body("s1"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.headers()["x-vercel-ai-data-stream"], "v1");

    let text = body_text(response).await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4, "{text}");
    assert_eq!(lines[0], r#"0:"Let me ""#);
    assert_eq!(lines[1], r#"0:"look.""#);
    assert!(lines[2].starts_with(r#"2:[{"#));
    let envelope: Value = serde_json::from_str(&lines[2][2..]).unwrap();
    assert_eq!(envelope[0]["type"], "search-summary");
    assert_eq!(lines[3], r#"0:"Here it is!""#);
}

#[tokio::test]
async fn weather_resume_streams_single_envelope() {
    let script = vec![
        // init: travel hands over, weather asks where
        ScriptedLlm::decision(&[], &[], Some("weatherAdvisor")),
        ScriptedLlm::decision(&["Where are you headed?"], &[], Some("finish")),
        // resume: forecast only, no prose
        ScriptedLlm::decision(&[], &[("weatherForecast", json!({"lat": 38.72, "long": -9.14}))], None),
        ScriptedLlm::decision(&[], &[], Some("finish")),
    ];
    let (app, _) = app(script, None);

    body_text(app.clone().oneshot(chat_request(init_body("t1"))).await.unwrap()).await;

    let response = app
        .oneshot(chat_request(json!({
            "messages": [{"content": "weather"}],
            "sessionId": "t1",
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1, "{text}");
    assert!(text.ends_with('\n'));
    assert!(lines[0].starts_with(r#"2:[{"id":"#));
    let envelope: Value = serde_json::from_str(&lines[0][2..]).unwrap();
    assert_eq!(envelope.as_array().unwrap().len(), 1);
    assert_eq!(envelope[0]["type"], "weather");
    assert_eq!(envelope[0]["data"], forecast());
}

#[tokio::test]
async fn resume_of_unknown_thread_is_404() {
    let (app, _) = app(vec![], None);
    let response = app
        .oneshot(chat_request(resume_body("nope", "hello")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn busy_thread_is_409() {
    let (app, engine) = app(vec![], None);
    let _held = engine
        .lanes()
        .try_acquire(&wayfarer_core::types::ThreadId::from_string("s1"))
        .unwrap();
    let response = app.oneshot(chat_request(init_body("s1"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_request_is_400() {
    let (app, _) = app(vec![], None);
    let response = app
        .clone()
        .oneshot(chat_request(json!({"sessionId": "s1", "messages": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::post("/api/chat")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn token_guards_chat() {
    let (app, _) = app(vec![], Some("secret"));
    let response = app
        .clone()
        .oneshot(chat_request(init_body("s1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::get("/api/threads")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn inspection_routes_show_checkpoints() {
    let script = vec![
        ScriptedLlm::decision(&["Welcome!"], &[], Some("finish")),
        ScriptedLlm::decision(&["Jordan is great."], &[], Some("finish")),
    ];
    let (app, _) = app(script, None);

    body_text(app.clone().oneshot(chat_request(init_body("s2"))).await.unwrap()).await;
    body_text(
        app.clone()
            .oneshot(chat_request(resume_body("s2", "Where should I go?")))
            .await
            .unwrap(),
    )
    .await;

    let response = app
        .clone()
        .oneshot(Request::get("/api/threads/s2").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let latest: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(latest["seq"], 2);
    assert_eq!(latest["state"]["active_sender"], "travelAdvisor");

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/threads/s2/checkpoints")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let history: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(history["checkpoints"].as_array().unwrap().len(), 2);

    let response = app
        .oneshot(Request::get("/api/threads/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
