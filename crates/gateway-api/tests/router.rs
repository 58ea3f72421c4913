use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use gateway_api::middleware::rate_limit::new_limiter;
use gateway_api::state::AppState;
use gateway_driver::MockDriver;
use gateway_pool::PoolManager;
use gateway_session::InMemorySessionStore;
use gateway_types::{NullObserver, PoolConfig, SessionStore};
use tower::ServiceExt;

async fn test_state() -> (AppState, gateway_types::SessionId) {
    let driver = Arc::new(MockDriver::new());
    let pool = PoolManager::new(PoolConfig::default(), driver, Arc::new(NullObserver)).unwrap();
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let record = sessions
        .create("integration-test", vec!["operator".into()], 60_000)
        .await
        .unwrap();
    let bus = Arc::new(gateway_events::EventBus::new(16));
    let limiter = Arc::new(new_limiter(1_000));
    let state = AppState::new(pool, sessions, bus, limiter, 5_000);
    (state, record.session_id)
}

#[tokio::test]
async fn health_endpoint_requires_no_auth() {
    let (state, _session) = test_state().await;
    let app = gateway_api::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn acquiring_a_context_without_credentials_is_unauthorized() {
    let (state, _session) = test_state().await;
    let app = gateway_api::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/contexts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn acquiring_a_context_with_a_valid_session_succeeds() {
    let (state, session) = test_state().await;
    let app = gateway_api::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/contexts")
                .header("x-api-key", session.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn pool_snapshot_reports_an_empty_pool_at_startup() {
    let (state, session) = test_state().await;
    let app = gateway_api::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/pool")
                .header("x-api-key", session.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
