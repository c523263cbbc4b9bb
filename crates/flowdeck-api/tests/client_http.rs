//! Exercises the gateway client against a loopback HTTP backend.

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use flowdeck_api::{ApiClient, ApiConfig, ApiError, SessionListQuery, TaskListQuery};
use serde_json::{json, Value};
use std::net::SocketAddr;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn client_for(addr: SocketAddr) -> ApiClient {
    let mut config = ApiConfig::new(format!("http://{addr}/api"));
    config.id_token = Some("token-1".to_string());
    config.project_id = Some("proj-1".to_string());
    ApiClient::new(config)
}

async fn tasks_echoing_headers(headers: HeaderMap) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let project = headers
        .get("x-project-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Json(json!({
        "data": [
            {"id": "t1", "status": "queued", "title": auth, "description": project},
        ]
    }))
}

#[tokio::test]
async fn tasks_list_sends_auth_and_project_headers() {
    let app = Router::new().route("/api/workflows/tasks", get(tasks_echoing_headers));
    let addr = serve(app).await;
    let client = client_for(addr);

    let tasks = client
        .tasks_list(&TaskListQuery::default())
        .await
        .expect("tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title.as_deref(), Some("Bearer token-1"));
    assert_eq!(tasks[0].description.as_deref(), Some("proj-1"));
}

#[tokio::test]
async fn html_body_surfaces_as_unexpected_html() {
    let app = Router::new().route(
        "/api/workflows/agents",
        get(|| async { Html("<html><body>front-end index</body></html>") }),
    );
    let addr = serve(app).await;
    let client = client_for(addr);

    let err = client.agents_list().await.expect_err("should fail");
    match err {
        ApiError::UnexpectedHtml { status } => assert_eq!(status, 200),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_2xx_carries_status_and_body_message() {
    async fn creds(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        // User-scoped call: the project header must be absent.
        let tainted = headers.contains_key("x-project-id");
        let message = if tainted { "bad token+project" } else { "bad token" };
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": message })))
    }
    let app = Router::new().route("/api/workflows/creds", get(creds));
    let addr = serve(app).await;
    let client = client_for(addr);

    let err = client.creds_list().await.expect_err("should fail");
    match &err {
        ApiError::Status { status, message, .. } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "bad token");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_rejection());
}

#[tokio::test]
async fn missing_session_agent_mapping_is_none() {
    let app = Router::new().route(
        "/api/workflows/agents/session/:id",
        get(|Path(_): Path<String>| async {
            (StatusCode::NOT_FOUND, Json(json!({"error": "no mapping"})))
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr);

    let mapping = client.session_agent_get("sess-1").await.expect("lookup");
    assert!(mapping.is_none());
}

#[tokio::test]
async fn session_documents_flatten_adapter_wrappers() {
    let app = Router::new().route(
        "/api/workflows/context/sessions/list",
        post(|| async {
            Json(json!({
                "documents": [
                    {"id": "s1", "data": {"title": "Server title", "value": {"workflowName": "wf-x"}}},
                    {"no_id": true},
                ]
            }))
        }),
    );
    let addr = serve(app).await;
    let client = client_for(addr);

    let sessions = client
        .list_sessions(&SessionListQuery::default())
        .await
        .expect("sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "s1");
    assert_eq!(sessions[0].title, "Server title");
    assert_eq!(sessions[0].workflow_name.as_deref(), Some("wf-x"));
}

#[tokio::test]
async fn consumer_lock_round_trips_the_consumer_header() {
    async fn lock_status(headers: HeaderMap) -> Json<Value> {
        let consumer = headers
            .get("x-consumer-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({
            "ok": true,
            "active": true,
            "now": 1700000000000_i64,
            "lock": {
                "consumerId": consumer,
                "consumerType": "LOCAL",
                "leaseMs": 30000,
                "expiresAt": 1700000030000_i64,
                "expiresInMs": 29000
            }
        }))
    }
    let app = Router::new().route(
        "/api/workflows/projects/:id/consumer-lock/status",
        get(lock_status),
    );
    let addr = serve(app).await;
    let client = client_for(addr);

    let status = client
        .consumer_lock_status("proj-1", Some("me-1"))
        .await
        .expect("status");
    assert!(status.locked);
    assert_eq!(status.consumer_id.as_deref(), Some("me-1"));
    assert!(status.owned_by_you);
    assert_eq!(status.remaining_ms, 29_000);
}

#[tokio::test]
async fn validation_failures_reject_before_dispatch() {
    // No server at all: a dispatched request would error differently.
    let client = ApiClient::new(ApiConfig::new("http://127.0.0.1:1/api"));
    let err = client.task_update("", &json!({})).await.expect_err("rejected");
    match err {
        ApiError::MissingField { call, field } => {
            assert_eq!(call, "task_update");
            assert_eq!(field, "id");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
