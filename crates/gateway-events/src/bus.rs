//! A broadcast-backed `PoolObserver` implementation.
//!
//! Modeled on `riptide-api`'s `EventBus` (tokio broadcast channel fanned
//! out to subscribers), simplified to a single typed callback surface
//! instead of ad-hoc pub/sub.

use async_trait::async_trait;
use gateway_types::{AuditRecord, GatewayEvent, PoolObserver};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Frame pushed to subscribers: either an operational event or an audit
/// record, tagged so a single stream (e.g. the WebSocket adapter) can
/// multiplex both without a second channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum BusFrame {
    Event(GatewayEvent),
    Audit(AuditRecord),
}

pub struct EventBus {
    sender: broadcast::Sender<BusFrame>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusFrame> {
        self.sender.subscribe()
    }

    fn publish(&self, frame: BusFrame) {
        // No subscribers is the common case at startup; that's fine, the
        // broadcast channel just drops the frame.
        if self.sender.send(frame).is_err() {
            debug!("event bus has no active subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl PoolObserver for EventBus {
    async fn on_event(&self, event: GatewayEvent) {
        self.publish(BusFrame::Event(event));
    }

    async fn on_audit(&self, record: AuditRecord) {
        if record.result == gateway_types::AuditResult::Failure {
            warn!(event_type = %record.event_type, resource = %record.resource, "audit: failure");
        }
        self.publish(BusFrame::Audit(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::{now_ms, BrowserId};

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.on_event(GatewayEvent::BrowserCreated {
            browser_id: BrowserId::new(),
            at: now_ms(),
        })
        .await;

        let frame = rx.recv().await.unwrap();
        assert!(matches!(frame, BusFrame::Event(GatewayEvent::BrowserCreated { .. })));
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.on_event(GatewayEvent::PoolAlert {
            details: "test".into(),
            at: now_ms(),
        })
        .await;
    }
}
