//! Token-bucket rate limiting per credential, modeled on `riptide-api`'s
//! `rate_limit_middleware` but backed by `governor` instead of a bespoke
//! resource manager.

use std::num::NonZeroU32;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::clock::DefaultClock;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use tracing::warn;

use crate::errors::ApiError;
use crate::state::AppState;

pub type ApiKeyLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// Builds a keyed limiter allowing `requests_per_minute` per distinct
/// credential, with a burst equal to the per-minute quota.
pub fn new_limiter(requests_per_minute: u32) -> ApiKeyLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute.max(1)).unwrap());
    RateLimiter::keyed(quota)
}

fn rate_limit_key(request: &Request) -> String {
    request
        .headers()
        .get("x-api-key")
        .or_else(|| request.headers().get(axum::http::header::AUTHORIZATION))
        .and_then(|h| h.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = rate_limit_key(&request);
    if state.limiter.check_key(&key).is_err() {
        warn!(key, "rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(request).await)
}
