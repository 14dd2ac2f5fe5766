//! Router tests driven through `tower::ServiceExt::oneshot`.
//!
//! Run with: cargo test -p gb-api --test api

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use gb_api::{create_router, AppState};
use gb_detector::MemoryHistoryStore;
use gb_ingestion::{MockFactory, MockTransport};
use gb_orchestrator::{MemoryConfigStore, Orchestrator};
use gb_types::{RawUserConfig, UserConfig, UserId};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

type TestState = AppState<MockFactory, MemoryConfigStore, MemoryHistoryStore>;

fn user(user_id: UserId, active: bool) -> UserConfig {
    let mut raw = RawUserConfig::new(user_id);
    raw.api_id = 1;
    raw.api_hash = "hash".into();
    raw.phone_number = "+1555".into();
    raw.interval = 0.05;
    raw.is_active = active;
    UserConfig::from_raw(raw).unwrap()
}

fn setup(store: MemoryConfigStore, factory: MockFactory) -> (Router, Arc<TestState>) {
    let orchestrator = Orchestrator::new(
        factory,
        Arc::new(store),
        Arc::new(MemoryHistoryStore::new()),
    )
    .with_restart_delay(Duration::from_millis(10));
    let state = Arc::new(AppState::new(orchestrator));
    (create_router(state.clone()), state)
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // Extractor rejections are plain text.
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = setup(MemoryConfigStore::new(), MockFactory::new());

    let (status, body) = call(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_session_lifecycle() {
    let factory = MockFactory::new().with_transport(1, MockTransport::new().with_listing(Vec::new()));
    let (app, state) = setup(MemoryConfigStore::new().with_user(user(1, false)), factory);

    let (status, body) = call(&app, Method::POST, "/v1/sessions/1/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");
    assert_eq!(state.orchestrator.store().is_active(1), Some(true));

    let (_, body) = call(&app, Method::POST, "/v1/sessions/1/start").await;
    assert_eq!(body["status"], "already_active");

    let (status, body) = call(&app, Method::GET, "/v1/sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_count"], 1);
    assert_eq!(body["sessions"][0]["user_id"], 1);

    let (status, body) = call(&app, Method::GET, "/v1/sessions/1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["started_at"].is_string());

    let (status, body) = call(&app, Method::POST, "/v1/sessions/1/restart").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");

    let (status, body) = call(&app, Method::POST, "/v1/sessions/1/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stopped");
    assert_eq!(state.orchestrator.store().is_active(1), Some(false));

    let (_, body) = call(&app, Method::POST, "/v1/sessions/1/stop").await;
    assert_eq!(body["status"], "not_running");

    let (status, _) = call(&app, Method::GET, "/v1/sessions/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_errors_map_to_status_codes() {
    let mut incomplete = user(2, false);
    incomplete.credentials.phone_number.clear();
    let store = MemoryConfigStore::new()
        .with_user(incomplete)
        .with_user(user(3, false));
    let factory = MockFactory::new().with_failing_user(3);
    let (app, state) = setup(store, factory);

    let (status, body) = call(&app, Method::POST, "/v1/sessions/99/start").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = call(&app, Method::POST, "/v1/sessions/2/start").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_config");

    let (status, body) = call(&app, Method::POST, "/v1/sessions/3/start").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "transport_error");

    // Failed starts do not flip the active flag.
    assert_eq!(state.orchestrator.store().is_active(3), Some(false));
    assert_eq!(state.orchestrator.active_count().await, 0);
}

#[tokio::test]
async fn test_non_numeric_user_id_is_rejected() {
    let (app, _) = setup(MemoryConfigStore::new(), MockFactory::new());

    let (status, _) = call(&app, Method::POST, "/v1/sessions/alice/start").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_store_failure_does_not_mask_lifecycle_result() {
    let store = MemoryConfigStore::new().with_user(user(1, false));
    let factory = MockFactory::new().with_transport(1, MockTransport::new().with_listing(Vec::new()));
    let (app, state) = setup(store, factory);
    state.orchestrator.store().set_fail_writes(true);

    let (status, body) = call(&app, Method::POST, "/v1/sessions/1/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");
    assert!(state.orchestrator.is_active(1).await);
    // The flag could not be written.
    assert_eq!(state.orchestrator.store().is_active(1), Some(false));

    let (status, body) = call(&app, Method::POST, "/v1/sessions/1/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stopped");
    assert!(!state.orchestrator.is_active(1).await);
}
