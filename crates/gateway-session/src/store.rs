//! In-memory `SessionStore`, in the shape of `riptide-api`'s
//! `SessionManager` (`riptide-api/src/sessions/manager.rs`) but without the
//! disk-backed cookie jar — the gateway only needs session identity and
//! expiry, not cookie persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use gateway_types::{now_ms, GatewayError, GatewayResult, SessionId, SessionRecord, SessionStore};
use tracing::debug;

pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    fn is_expired(record: &SessionRecord) -> bool {
        now_ms() >= record.expires_at
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        user_id: &str,
        roles: Vec<String>,
        ttl_ms: u64,
    ) -> GatewayResult<SessionRecord> {
        let created_at = now_ms();
        let record = SessionRecord {
            session_id: SessionId::new(),
            user_id: user_id.to_string(),
            roles,
            created_at,
            expires_at: created_at.saturating_add(ttl_ms),
            last_accessed_at: created_at,
        };
        self.sessions.insert(record.session_id, record.clone());
        debug!(session_id = %record.session_id, user_id, "session created");
        Ok(record)
    }

    async fn get(&self, session_id: SessionId) -> GatewayResult<SessionRecord> {
        match self.sessions.get(&session_id) {
            Some(record) if !Self::is_expired(&record) => Ok(record.clone()),
            Some(_) => {
                self.sessions.remove(&session_id);
                Err(GatewayError::Unauthorized)
            }
            None => Err(GatewayError::Unauthorized),
        }
    }

    async fn touch(&self, session_id: SessionId) -> GatewayResult<()> {
        let mut entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(GatewayError::Unauthorized)?;
        if Self::is_expired(&entry) {
            drop(entry);
            self.sessions.remove(&session_id);
            return Err(GatewayError::Unauthorized);
        }
        entry.last_accessed_at = now_ms();
        Ok(())
    }

    async fn delete(&self, session_id: SessionId) -> GatewayResult<()> {
        self.sessions.remove(&session_id);
        Ok(())
    }

    async fn list(&self) -> GatewayResult<Vec<SessionRecord>> {
        self.sessions.retain(|_, record| !Self::is_expired(record));
        Ok(self.sessions.iter().map(|e| e.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemorySessionStore::new();
        let record = store.create("alice", vec!["operator".into()], 60_000).await.unwrap();
        let fetched = store.get(record.session_id).await.unwrap();
        assert_eq!(fetched.user_id, "alice");
    }

    #[tokio::test]
    async fn expired_session_is_unauthorized() {
        let store = InMemorySessionStore::new();
        let record = store.create("bob", vec![], 0).await.unwrap();
        // ttl_ms = 0 means expires_at == created_at, already past by the
        // time we check.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(matches!(
            store.get(record.session_id).await,
            Err(GatewayError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemorySessionStore::new();
        let record = store.create("carol", vec![], 60_000).await.unwrap();
        store.delete(record.session_id).await.unwrap();
        store.delete(record.session_id).await.unwrap();
        assert!(store.get(record.session_id).await.is_err());
    }

    #[tokio::test]
    async fn list_excludes_expired_sessions() {
        let store = InMemorySessionStore::new();
        store.create("live", vec![], 60_000).await.unwrap();
        store.create("dead", vec![], 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user_id, "live");
    }
}
