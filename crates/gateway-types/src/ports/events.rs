//! Event & audit port: typed callbacks, not ad-hoc pub/sub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ids::{BrowserId, SessionId};
use crate::instance::TimestampMs;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    BrowserCreated {
        browser_id: BrowserId,
        at: TimestampMs,
    },
    BrowserAcquired {
        browser_id: BrowserId,
        session_id: SessionId,
        at: TimestampMs,
    },
    BrowserReleased {
        browser_id: BrowserId,
        session_id: SessionId,
        at: TimestampMs,
    },
    BrowserRemoved {
        browser_id: BrowserId,
        reason: String,
        at: TimestampMs,
    },
    BrowserRestarted {
        browser_id: BrowserId,
        reason: String,
        at: TimestampMs,
    },
    BrowserRecycled {
        browser_id: BrowserId,
        reason: String,
        at: TimestampMs,
    },
    PoolScaled {
        previous_size: usize,
        new_size: usize,
        reason: String,
        at: TimestampMs,
    },
    PoolAlert {
        details: String,
        at: TimestampMs,
    },
}

/// Actor issuing a state-changing operation, for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Actor {
    Session(SessionId),
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_type: String,
    pub at: TimestampMs,
    pub actor: Actor,
    pub resource: String,
    pub result: AuditResult,
    pub reason: Option<String>,
}

/// Typed callback surface registered once at initialization. Implementors
/// must not block the caller for long —
/// fan-out to slow sinks happens inside the implementation, not here.
#[async_trait]
pub trait PoolObserver: Send + Sync {
    async fn on_event(&self, event: GatewayEvent);

    async fn on_audit(&self, record: AuditRecord);
}

/// An observer that does nothing; the default when no sink is wired up.
pub struct NullObserver;

#[async_trait]
impl PoolObserver for NullObserver {
    async fn on_event(&self, _event: GatewayEvent) {}
    async fn on_audit(&self, _record: AuditRecord) {}
}
