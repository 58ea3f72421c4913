//! Context (= checked-out browser) and page lifecycle endpoints. Each
//! handler is a thin call into `PoolManager` plus status mapping — no
//! navigation/evaluation/capture verbs live here, only the lifecycle the
//! pool itself owns.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use gateway_types::{now_ms, BrowserId, PageId};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::ApiResult;
use crate::middleware::AuthedSession;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct AcquireQuery {
    pub timeout_ms: Option<u64>,
}

pub async fn create_context(
    State(state): State<AppState>,
    Extension(AuthedSession(session_id)): Extension<AuthedSession>,
    Query(query): Query<AcquireQuery>,
) -> ApiResult<Json<gateway_types::BrowserInstance>> {
    let timeout_ms = query.timeout_ms.unwrap_or(state.default_acquire_timeout_ms);
    let deadline = now_ms().saturating_add(timeout_ms);
    let instance = state.pool.acquire(session_id, deadline).await?;
    Ok(Json(instance))
}

pub async fn release_context(
    State(state): State<AppState>,
    Extension(AuthedSession(session_id)): Extension<AuthedSession>,
    Path(context_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .pool
        .release(BrowserId::from(context_id), session_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_page(
    State(state): State<AppState>,
    Extension(AuthedSession(session_id)): Extension<AuthedSession>,
    Path(context_id): Path<Uuid>,
) -> ApiResult<Json<PageId>> {
    let page_id = state
        .pool
        .create_page(BrowserId::from(context_id), session_id)
        .await?;
    Ok(Json(page_id))
}

pub async fn close_page(
    State(state): State<AppState>,
    Extension(AuthedSession(session_id)): Extension<AuthedSession>,
    Path((context_id, page_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .pool
        .close_page(
            BrowserId::from(context_id),
            session_id,
            PageId::from(page_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
