//! Maps `GatewayError` (and the adapter-layer errors that never reach the
//! pool core) onto HTTP status codes and a JSON error body, mirroring
//! `riptide-api`'s `ApiError -> IntoResponse` pattern.

use axum::{http::StatusCode, response::IntoResponse, Json};
use gateway_types::GatewayError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(err) => match err {
                GatewayError::NotFound(_) | GatewayError::PageNotFound(_) => StatusCode::NOT_FOUND,
                GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
                GatewayError::UnauthorizedSession(..) => StatusCode::FORBIDDEN,
                GatewayError::Timeout => StatusCode::REQUEST_TIMEOUT,
                GatewayError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
                GatewayError::PageLimitReached(_) | GatewayError::AlreadyInitialized => {
                    StatusCode::CONFLICT
                }
                GatewayError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
                GatewayError::ShuttingDown
                | GatewayError::CircuitOpen
                | GatewayError::Unhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
                GatewayError::LaunchFailed(_) => StatusCode::BAD_GATEWAY,
                GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited => "rate_limited",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Gateway(err) => err.code(),
        }
    }

    fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            ApiError::RateLimited => Some("slow down and retry after a short backoff"),
            ApiError::InvalidRequest(_) => None,
            ApiError::Gateway(err) => err.recovery_hint(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "recovery_hint": self.recovery_hint(),
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
