//! Bearer token / `X-API-Key` authentication, modeled on `riptide-api`'s
//! `auth_middleware` but resolving the credential against the gateway's own
//! `SessionStore` instead of a flat key allowlist.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use gateway_types::{GatewayError, SessionId};
use tracing::debug;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::state::AppState;

/// The authenticated caller, inserted into request extensions by
/// [`auth_middleware`] for handlers to pull out.
#[derive(Debug, Clone, Copy)]
pub struct AuthedSession(pub SessionId);

fn credential_from_headers(request: &Request) -> Option<&str> {
    if let Some(key) = request
        .headers()
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
    {
        return Some(key);
    }
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path();
    if path == "/v1/health" {
        return Ok(next.run(request).await);
    }

    let credential = credential_from_headers(&request)
        .map(str::to_string)
        .ok_or(ApiError::Gateway(GatewayError::Unauthorized))?;

    let session_id: SessionId = credential
        .parse::<Uuid>()
        .map_err(|_| ApiError::Gateway(GatewayError::Unauthorized))?
        .into();

    state.sessions.get(session_id).await?;
    let _ = state.sessions.touch(session_id).await;
    debug!(session_id = %session_id, path, "authenticated");

    request.extensions_mut().insert(AuthedSession(session_id));
    Ok(next.run(request).await)
}
