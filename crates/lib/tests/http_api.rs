//! Integration test: run a stand-in chat service on a free port with axum and drive the
//! HTTP client and the coordinator against it. No real assistant service is needed.
//! Server tasks are left running when each test ends.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chatline::api::{ApiError, ChatApi, ChatRequest, ClearRequest, HttpChatApi};
use chatline::coordinator::SEND_FALLBACK;
use chatline::health::Health;
use chatline::{
    CoordinatorOptions, FileSessionStore, MemorySessionStore, Outcome, RequestCoordinator,
    RequestState, Role, SessionContext, SessionStore,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bodies and X-Session-ID headers the stand-in service received.
#[derive(Clone, Default)]
struct Recorded {
    calls: Arc<Mutex<Vec<(String, Value, Option<String>)>>>,
}

impl Recorded {
    fn push(&self, path: &str, headers: &HeaderMap, body: Value) {
        let session = headers
            .get("x-session-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.calls
            .lock()
            .unwrap()
            .push((path.to_string(), body, session));
    }

    fn calls(&self) -> Vec<(String, Value, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

async fn chat_ok(State(rec): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    rec.push("/chat", &headers, body.clone());
    let message = body.get("message").and_then(|v| v.as_str()).unwrap_or("");
    Json(json!({
        "response": format!("echo: {}", message),
        "success": true,
        "error": null,
        "session_id": "abc123"
    }))
}

async fn chat_broken(State(rec): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    rec.push("/chat", &headers, body);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "response": "The assistant hit an internal error.",
            "success": false,
            "session_id": "s-err"
        })),
    )
}

async fn chat_plain_500() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

async fn clear_ok(State(rec): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    rec.push("/chat/clear", &headers, body);
    Json(json!({ "success": true, "message": "Chat history cleared" }))
}

async fn root_ok() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn root_down() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

/// Serve `app` on 127.0.0.1 with an OS-assigned port; returns the API base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}/api", addr)
}

fn healthy_service(rec: Recorded) -> Router {
    Router::new()
        .route("/api/", get(root_ok))
        .route("/api/chat", post(chat_ok))
        .route("/api/chat/clear", post(clear_ok))
        .with_state(rec)
}

/// A port nothing listens on.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn client(base: &str) -> HttpChatApi {
    HttpChatApi::new(base, Duration::from_secs(5)).expect("build client")
}

fn coordinator(api: HttpChatApi, store: Arc<dyn SessionStore>) -> RequestCoordinator {
    RequestCoordinator::new(
        Arc::new(api),
        SessionContext::new(store),
        CoordinatorOptions::default(),
    )
}

#[tokio::test]
async fn chat_wire_format_and_session_header() {
    let rec = Recorded::default();
    let base = serve(healthy_service(rec.clone())).await;
    let api = client(&base);

    let reply = api
        .chat(&ChatRequest {
            message: "hello".into(),
            session_id: None,
        })
        .await
        .expect("chat ok");
    assert!(reply.success);
    assert_eq!(reply.response, "echo: hello");
    assert_eq!(reply.session_id.as_deref(), Some("abc123"));

    api.chat(&ChatRequest {
        message: "again".into(),
        session_id: Some("abc123".into()),
    })
    .await
    .expect("chat ok");

    let calls = rec.calls();
    assert_eq!(calls[0].1, json!({ "message": "hello" }));
    assert_eq!(calls[0].2, None);
    assert_eq!(calls[1].1, json!({ "message": "again", "session_id": "abc123" }));
    assert_eq!(calls[1].2.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn coordinator_round_trips_session_id_over_http() {
    let rec = Recorded::default();
    let base = serve(healthy_service(rec.clone())).await;
    let dir = std::env::temp_dir().join(format!("chatline-http-test-{}", uuid::Uuid::new_v4()));
    let store = Arc::new(FileSessionStore::new(dir.join("session_id")));
    let c = coordinator(client(&base), store.clone());

    assert_eq!(c.send("first").unwrap().await, Outcome::Replied);
    assert_eq!(store.get().as_deref(), Some("abc123"));
    assert_eq!(c.send("second").unwrap().await, Outcome::Replied);

    let calls = rec.calls();
    assert_eq!(calls[0].1.get("session_id"), None);
    assert_eq!(calls[1].1["session_id"], "abc123");

    assert_eq!(c.clear().unwrap().await, Outcome::Cleared);
    let calls = rec.calls();
    assert_eq!(calls[2].0, "/chat/clear");
    assert_eq!(calls[2].1, json!({ "session_id": "abc123" }));
    assert_eq!(c.messages().len(), 1);
    // clearing history keeps the session id
    assert_eq!(store.get().as_deref(), Some("abc123"));
}

#[tokio::test]
async fn error_status_with_chat_body_is_surfaced() {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/api/chat", post(chat_broken))
        .with_state(rec.clone());
    let base = serve(app).await;

    let api = client(&base);
    let err = api
        .chat(&ChatRequest {
            message: "hi".into(),
            session_id: None,
        })
        .await
        .expect_err("500 is a failure");
    assert!(matches!(err, ApiError::Rejected { status: 500, .. }));

    let store = Arc::new(MemorySessionStore::new());
    let c = coordinator(client(&base), store.clone());
    c.send("hi").unwrap().await;
    let last = c.messages().pop().unwrap();
    assert_eq!(last.role, Role::Error);
    assert_eq!(last.content, "The assistant hit an internal error.");
    assert_eq!(store.get().as_deref(), Some("s-err"));
}

#[tokio::test]
async fn plain_error_status_falls_back() {
    let app = Router::new().route("/api/chat", post(chat_plain_500));
    let base = serve(app).await;

    let err = client(&base)
        .chat(&ChatRequest {
            message: "hi".into(),
            session_id: None,
        })
        .await
        .expect_err("500 is a failure");
    assert!(matches!(err, ApiError::Status { status: 500, .. }));
}

#[tokio::test]
async fn offline_send_appends_fallback_error() {
    let base = format!("http://127.0.0.1:{}/api", closed_port());
    let c = coordinator(client(&base), Arc::new(MemorySessionStore::new()));

    c.send("anyone there?").unwrap().await;

    let msgs = c.messages();
    assert_eq!(msgs.len(), 3);
    assert_eq!(msgs[1].role, Role::User);
    assert_eq!(msgs[2].role, Role::Error);
    assert_eq!(msgs[2].content, SEND_FALLBACK);
    assert!(matches!(c.request_state(), RequestState::Error(_)));
}

#[tokio::test]
async fn clear_against_unreachable_service_keeps_history() {
    let base = format!("http://127.0.0.1:{}/api", closed_port());
    let api = client(&base);
    let err = api
        .clear_history(&ClearRequest { session_id: None })
        .await
        .expect_err("nothing listening");
    assert!(err.is_transport());

    let c = coordinator(api, Arc::new(MemorySessionStore::new()));
    let before = c.messages();
    assert!(matches!(c.clear().unwrap().await, Outcome::Failed(_)));
    let after = c.messages();
    assert_eq!(after[..before.len()], before[..]);
    assert_eq!(after.len(), before.len() + 1);
}

#[tokio::test]
async fn health_probe_classifies_service() {
    let base = serve(healthy_service(Recorded::default())).await;
    let c = coordinator(client(&base), Arc::new(MemorySessionStore::new()));
    assert_eq!(c.probe_health().await, Some(Health::Healthy));
    assert!(c.notice().is_none());

    let base = serve(Router::new().route("/api/", get(root_down))).await;
    let c = coordinator(client(&base), Arc::new(MemorySessionStore::new()));
    assert_eq!(c.probe_health().await, Some(Health::Unavailable));
    assert_eq!(
        c.notice().map(|n| n.text),
        Health::Unavailable.notice_text().map(str::to_string)
    );

    let base = format!("http://127.0.0.1:{}/api", closed_port());
    let c = coordinator(client(&base), Arc::new(MemorySessionStore::new()));
    assert_eq!(c.probe_health().await, Some(Health::Unreachable));
    assert!(c.notice().is_some());
}
