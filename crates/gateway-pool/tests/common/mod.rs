use async_trait::async_trait;
use gateway_types::{AuditRecord, GatewayEvent, PoolConfig, PoolObserver};
use parking_lot::Mutex;

/// Records every event delivered to it, for assertions that need to look at
/// what the pool announced rather than only its resulting state.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<GatewayEvent>>,
}

#[async_trait]
impl PoolObserver for RecordingObserver {
    async fn on_event(&self, event: GatewayEvent) {
        self.events.lock().push(event);
    }

    async fn on_audit(&self, _record: AuditRecord) {}
}

/// A small, fast-ticking config so scenario tests don't need to wait on
/// production-sized timeouts and cooldowns.
pub fn tiny_config() -> PoolConfig {
    PoolConfig {
        max_browsers: 2,
        min_browsers: 0,
        max_queue_length: 10,
        maintenance_tick_ms: 50,
        health_check_interval_ms: 50,
        idle_timeout_ms: 10_000,
        recycling_cooldown_ms: 0,
        scale_up_cooldown_ms: 0,
        scale_down_cooldown_ms: 0,
        ..Default::default()
    }
}
