//! Session Store port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GatewayResult;
use crate::ids::SessionId;
use crate::instance::TimestampMs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub user_id: String,
    pub roles: Vec<String>,
    pub created_at: TimestampMs,
    pub expires_at: TimestampMs,
    pub last_accessed_at: TimestampMs,
}

/// The pool treats `sessionId` purely as an opaque ownership tag; this
/// trait is what the adapters and auth middleware use to actually resolve
/// and manage sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: &str, roles: Vec<String>, ttl_ms: u64)
        -> GatewayResult<SessionRecord>;

    async fn get(&self, session_id: SessionId) -> GatewayResult<SessionRecord>;

    async fn touch(&self, session_id: SessionId) -> GatewayResult<()>;

    async fn delete(&self, session_id: SessionId) -> GatewayResult<()>;

    async fn list(&self) -> GatewayResult<Vec<SessionRecord>>;
}
