//! Error taxonomy for the gateway.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{BrowserId, PageId, SessionId};

/// Broad classification used by adapters to pick a status/severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    Resource,
    System,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// The gateway's stable error taxonomy. Every pool and adapter operation
/// that can fail returns one of these rather than a bare string.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    #[error("browser {0} not found")]
    NotFound(BrowserId),

    #[error("page {0} not found")]
    PageNotFound(PageId),

    #[error("session {0} does not own browser {1}")]
    UnauthorizedSession(SessionId, BrowserId),

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("pool is shutting down")]
    ShuttingDown,

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("waiter queue is full")]
    QueueFull,

    #[error("acquisition timed out after waiting in queue")]
    Timeout,

    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("browser {0} has reached its page limit")]
    PageLimitReached(BrowserId),

    #[error("browser {0} is unhealthy")]
    Unhealthy(BrowserId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pool already initialized")]
    AlreadyInitialized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn category(&self) -> ErrorCategory {
        use GatewayError::*;
        match self {
            Unauthorized => ErrorCategory::Authentication,
            UnauthorizedSession(..) => ErrorCategory::Authorization,
            NotFound(_) | PageNotFound(_) | PageLimitReached(_) => ErrorCategory::Resource,
            InvalidConfig(_) => ErrorCategory::Validation,
            ShuttingDown | CircuitOpen | QueueFull | Timeout | LaunchFailed(_) | Unhealthy(_)
            | AlreadyInitialized | Internal(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        use GatewayError::*;
        match self {
            Timeout | QueueFull | CircuitOpen => ErrorSeverity::Medium,
            Unauthorized | UnauthorizedSession(..) | InvalidConfig(_) | NotFound(_)
            | PageNotFound(_) | PageLimitReached(_) | AlreadyInitialized => ErrorSeverity::Low,
            LaunchFailed(_) | Unhealthy(_) => ErrorSeverity::High,
            ShuttingDown | Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// A short hint a client can act on.
    pub fn recovery_hint(&self) -> Option<&'static str> {
        use GatewayError::*;
        match self {
            Timeout => Some("retry with a longer deadline or lower concurrency"),
            CircuitOpen => Some("retry later; the pool is shedding load"),
            QueueFull => Some("reduce concurrency or retry later"),
            LaunchFailed(_) => Some("retry later; the browser process failed to start"),
            Unauthorized | UnauthorizedSession(..) => Some("refresh your session"),
            _ => None,
        }
    }

    /// A stable machine-readable code, independent of the Display message.
    pub fn code(&self) -> &'static str {
        use GatewayError::*;
        match self {
            NotFound(_) => "not_found",
            PageNotFound(_) => "page_not_found",
            UnauthorizedSession(..) => "unauthorized_session",
            Unauthorized => "unauthorized",
            ShuttingDown => "shutting_down",
            CircuitOpen => "circuit_open",
            QueueFull => "queue_full",
            Timeout => "timeout",
            LaunchFailed(_) => "launch_failed",
            PageLimitReached(_) => "page_limit_reached",
            Unhealthy(_) => "unhealthy",
            InvalidConfig(_) => "invalid_config",
            AlreadyInitialized => "already_initialized",
            Internal(_) => "internal",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_has_a_retry_hint() {
        let err = GatewayError::Timeout;
        assert_eq!(err.category(), ErrorCategory::System);
        assert!(err.recovery_hint().is_some());
    }

    #[test]
    fn unauthorized_session_is_authorization_not_authentication() {
        let err = GatewayError::UnauthorizedSession(SessionId::new(), BrowserId::new());
        assert_eq!(err.category(), ErrorCategory::Authorization);
        assert_eq!(err.code(), "unauthorized_session");
    }
}
