//! HTTP Provider Tests
//!
//! Runs the agent and Langfuse clients against in-process axum servers
//! bound to an ephemeral local port.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use distill_core::{AgentError, DistillError, TraceError, TraceId};
use distill_llm::providers::agent::HttpAgentFactory;
use distill_llm::{
    fetch_trace_settled, AgentFactory, FetchPolicy, LangfuseClient, LangfuseCredentials,
    TraceContext, TraceSink, TraceSource, TraceUpdate,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// HARNESS
// ============================================================================

#[derive(Default)]
struct Recorded {
    bodies: Mutex<Vec<Value>>,
    auth: Mutex<Vec<String>>,
    trace_hits: AtomicU32,
}

type Shared = Arc<Recorded>;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn record_auth(shared: &Shared, headers: &HeaderMap) {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        shared.auth.lock().expect("lock").push(value.to_string());
    }
}

// ============================================================================
// AGENT
// ============================================================================

async fn agent_go(State(shared): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    shared.bodies.lock().expect("lock").push(body.clone());
    Json(json!({
        "log": [{"type": "ai", "content": "<think>plan</think>"}],
        "answer": format!("echo: {}", body["instruction"].as_str().unwrap_or(""))
    }))
}

fn healthy_agent(shared: Shared) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/go", post(agent_go))
        .with_state(shared)
}

#[tokio::test]
async fn test_agent_connect_and_go() {
    let shared = Shared::default();
    let base = serve(healthy_agent(shared.clone())).await;

    let factory = HttpAgentFactory::new(format!("{}/", base), "/data/biomni", Duration::from_secs(5));
    let agent = factory.connect().await.expect("agent connects");

    let ctx = TraceContext::new(TraceId::from_string("t-123"), "chat");
    let run = agent.go("what is BRCA1?", &ctx).await.expect("agent runs");

    assert_eq!(run.final_answer, "echo: what is BRCA1?");
    assert_eq!(run.log.len(), 1);

    let bodies = shared.bodies.lock().expect("lock");
    assert_eq!(bodies[0]["trace_id"], json!("t-123"));
    assert_eq!(bodies[0]["trace_name"], json!("chat"));
    assert_eq!(bodies[0]["data_path"], json!("/data/biomni"));
}

#[tokio::test]
async fn test_agent_connect_fails_when_unhealthy() {
    let app = Router::new().route(
        "/health",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "loading") }),
    );
    let base = serve(app).await;

    let factory = HttpAgentFactory::new(base, "/data", Duration::from_secs(5));
    let result = factory.connect().await;
    assert!(matches!(
        result,
        Err(DistillError::Agent(AgentError::InitializationFailed { .. }))
    ));
}

#[tokio::test]
async fn test_agent_connect_bounded_by_health_check_timeout() {
    let app = Router::new().route(
        "/health",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "ok"
        }),
    );
    let base = serve(app).await;

    // Runs may take minutes; the health check must not.
    let factory = HttpAgentFactory::new(base, "/data", Duration::from_secs(600))
        .with_health_timeout(Duration::from_millis(200));
    let result = tokio::time::timeout(Duration::from_secs(3), factory.connect())
        .await
        .expect("connect gives up before the slow health check answers");
    assert!(matches!(
        result,
        Err(DistillError::Agent(AgentError::InitializationFailed { .. }))
    ));
}

#[tokio::test]
async fn test_agent_error_detail_is_surfaced() {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/go",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"detail": "tool crashed"})),
                )
            }),
        );
    let base = serve(app).await;

    let agent = HttpAgentFactory::new(base, "/data", Duration::from_secs(5))
        .connect()
        .await
        .expect("agent connects");
    let ctx = TraceContext::new(TraceId::new(), "chat");
    match agent.go("q", &ctx).await {
        Err(DistillError::Agent(AgentError::InvocationFailed { reason, .. })) => {
            assert!(reason.contains("tool crashed"), "reason was {}", reason);
            assert!(reason.contains("500"), "reason was {}", reason);
        }
        other => panic!("expected invocation failure, got {:?}", other),
    }
}

// ============================================================================
// LANGFUSE
// ============================================================================

async fn get_trace(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    record_auth(&shared, &headers);
    let hit = shared.trace_hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit < 2 {
        (StatusCode::NOT_FOUND, Json(json!({"message": "Trace not found"})))
    } else {
        (StatusCode::OK, Json(json!({"id": id, "observations": []})))
    }
}

async fn ingest(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record_auth(&shared, &headers);
    shared.bodies.lock().expect("lock").push(body);
    (StatusCode::MULTI_STATUS, Json(json!({"successes": [{"id": "e", "status": 201}], "errors": []})))
}

fn langfuse(shared: Shared) -> Router {
    Router::new()
        .route("/api/public/traces/:id", get(get_trace))
        .route("/api/public/ingestion", post(ingest))
        .with_state(shared)
}

fn client(base: String) -> LangfuseClient {
    LangfuseClient::new(
        LangfuseCredentials::new(base, "pk-lf-test", "sk-lf-test"),
        Duration::from_secs(5),
    )
    .expect("client builds")
}

#[tokio::test]
async fn test_trace_fetch_polls_until_found() {
    let shared = Shared::default();
    let base = serve(langfuse(shared.clone())).await;
    let lf = client(base);

    let id = TraceId::from_string("abc");
    let first = lf.fetch_trace(&id).await;
    assert!(matches!(
        first,
        Err(DistillError::Trace(TraceError::NotFound { .. }))
    ));

    let policy = FetchPolicy {
        settle: Duration::ZERO,
        attempts: 3,
        retry_delay: Duration::from_millis(5),
    };
    let doc = fetch_trace_settled(&lf, &id, policy).await.expect("found");
    assert_eq!(doc["id"], json!("abc"));

    // "pk-lf-test:sk-lf-test" in base64
    let auth = shared.auth.lock().expect("lock");
    assert!(auth
        .iter()
        .all(|a| a == "Basic cGstbGYtdGVzdDpzay1sZi10ZXN0"));
}

#[tokio::test]
async fn test_trace_update_sends_trace_create() {
    let shared = Shared::default();
    let base = serve(langfuse(shared.clone())).await;
    let lf = client(base);

    let id = TraceId::from_string("abc");
    lf.update_trace(&id, TraceUpdate::failed("chat", "Q", "boom"))
        .await
        .expect("update accepted");

    let bodies = shared.bodies.lock().expect("lock");
    let event = &bodies[0]["batch"][0];
    assert_eq!(event["type"], json!("trace-create"));
    assert_eq!(event["body"]["id"], json!("abc"));
    assert_eq!(event["body"]["metadata"]["status_message"], json!("boom"));
}

#[tokio::test]
async fn test_trace_update_rejection_is_reported() {
    let app = Router::new().route(
        "/api/public/ingestion",
        post(|| async {
            (
                StatusCode::MULTI_STATUS,
                Json(json!({"successes": [], "errors": [{"id": "e1", "status": 400, "message": "bad body"}]})),
            )
        }),
    );
    let base = serve(app).await;
    let lf = client(base);

    let result = lf
        .update_trace(&TraceId::from_string("abc"), TraceUpdate::default())
        .await;
    match result {
        Err(DistillError::Trace(TraceError::ReportFailed { reason, .. })) => {
            assert!(reason.contains("bad body"));
        }
        other => panic!("expected report failure, got {:?}", other),
    }
}
