//! Axum-based REST, WebSocket, and JSON-RPC façade over a `PoolManager`.
//!
//! Every handler here is a thin call into the pool core plus status
//! mapping; no navigation/evaluation/capture verbs live in this crate —
//! only the context/page lifecycle the pool itself owns.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod rpc;
pub mod state;
pub mod streaming;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Builds the full router: REST context/page endpoints, the pool snapshot
/// and metrics endpoints, the event WebSocket stream, the JSON-RPC HTTP
/// and WebSocket adapters, and a health probe — with rate limiting and
/// authentication layered in front of everything except `/v1/health`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handlers::health::health))
        .route("/v1/contexts", post(handlers::contexts::create_context))
        .route(
            "/v1/contexts/:context_id",
            delete(handlers::contexts::release_context),
        )
        .route(
            "/v1/contexts/:context_id/pages",
            post(handlers::contexts::create_page),
        )
        .route(
            "/v1/contexts/:context_id/pages/:page_id",
            delete(handlers::contexts::close_page),
        )
        .route("/v1/pool", get(handlers::pool::pool_snapshot))
        .route("/v1/metrics", get(handlers::pool::metrics_snapshot))
        .route("/v1/stream", get(streaming::stream_events))
        .route("/v1/rpc", post(rpc::rpc_http))
        .route("/v1/rpc/ws", get(rpc::rpc_ws))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
