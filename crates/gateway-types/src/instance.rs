//! The unit of resource the pool manages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ids::{BrowserId, PageId, SessionId};

/// Lifecycle state of a `BrowserInstance`. Transitions are
/// Idle -> Active -> Idle or Idle -> Active -> Recycling -> Disposed;
/// Disposed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Idle,
    Active,
    Recycling,
    Disposed,
}

/// Milliseconds since `UNIX_EPOCH`. Used instead of `Instant` on anything
/// that crosses into a serializable snapshot.
pub type TimestampMs = u64;

pub fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A managed browser process. The Pool Manager is the sole mutator; every
/// other component holds only the id and reads snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserInstance {
    pub id: BrowserId,
    pub state: InstanceState,
    pub created_at: TimestampMs,
    pub last_used_at: TimestampMs,
    pub use_count: u64,
    pub owner: Option<SessionId>,
    pub pages: HashMap<PageId, ()>,
    pub pid: Option<u32>,
}

impl BrowserInstance {
    pub fn new(id: BrowserId, pid: Option<u32>) -> Self {
        let created_at = now_ms();
        Self {
            id,
            state: InstanceState::Idle,
            created_at,
            last_used_at: created_at,
            use_count: 0,
            owner: None,
            pages: HashMap::new(),
            pid,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn age_ms(&self, at: TimestampMs) -> u64 {
        at.saturating_sub(self.created_at)
    }

    pub fn idle_ms(&self, at: TimestampMs) -> u64 {
        at.saturating_sub(self.last_used_at)
    }

    /// Marks the instance Active and bumps use_count (monotonic).
    pub fn mark_active(&mut self, owner: SessionId) {
        debug_assert_eq!(self.state, InstanceState::Idle);
        self.state = InstanceState::Active;
        self.owner = Some(owner);
        self.use_count += 1;
        self.last_used_at = now_ms();
    }

    pub fn mark_idle(&mut self) {
        self.state = InstanceState::Idle;
        self.owner = None;
        self.last_used_at = now_ms();
    }

    pub fn mark_recycling(&mut self) {
        self.state = InstanceState::Recycling;
    }

    pub fn mark_disposed(&mut self) {
        self.state = InstanceState::Disposed;
        self.owner = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_count_is_monotonic_across_active_cycles() {
        let mut inst = BrowserInstance::new(BrowserId::new(), None);
        let s1 = SessionId::new();
        inst.mark_active(s1);
        assert_eq!(inst.use_count, 1);
        inst.mark_idle();
        inst.mark_active(SessionId::new());
        assert_eq!(inst.use_count, 2);
    }

    #[test]
    fn page_count_matches_pages_len() {
        let mut inst = BrowserInstance::new(BrowserId::new(), None);
        inst.pages.insert(PageId::new(), ());
        inst.pages.insert(PageId::new(), ());
        assert_eq!(inst.page_count(), 2);
    }
}
