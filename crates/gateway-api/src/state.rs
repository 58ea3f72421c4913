use std::sync::Arc;

use gateway_events::EventBus;
use gateway_pool::PoolManager;
use gateway_types::SessionStore;

use crate::middleware::rate_limit::ApiKeyLimiter;

/// Shared state every handler and middleware layer is built against.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PoolManager>,
    pub sessions: Arc<dyn SessionStore>,
    pub bus: Arc<EventBus>,
    pub limiter: Arc<ApiKeyLimiter>,
    /// Default acquisition deadline, used when a request doesn't override
    /// it with `?timeout_ms=`.
    pub default_acquire_timeout_ms: u64,
}

impl AppState {
    pub fn new(
        pool: Arc<PoolManager>,
        sessions: Arc<dyn SessionStore>,
        bus: Arc<EventBus>,
        limiter: Arc<ApiKeyLimiter>,
        default_acquire_timeout_ms: u64,
    ) -> Self {
        Self {
            pool,
            sessions,
            bus,
            limiter,
            default_acquire_timeout_ms,
        }
    }
}
