//! Invariant-level checks that should hold regardless of the exact scenario
//! driving them.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{tiny_config, RecordingObserver};
use gateway_driver::MockDriver;
use gateway_pool::PoolManager;
use gateway_types::{
    now_ms, BrowserHandle, GatewayError, GatewayEvent, InstanceState, NullObserver, SessionId,
};

#[tokio::test]
async fn a_session_cannot_release_a_browser_it_does_not_own() {
    let driver = Arc::new(MockDriver::new());
    let manager = PoolManager::new(tiny_config(), driver, Arc::new(NullObserver)).unwrap();

    let owner = SessionId::new();
    let inst = manager.acquire(owner, now_ms() + 5_000).await.unwrap();

    let intruder = SessionId::new();
    let result = manager.release(inst.id, intruder).await;
    assert!(matches!(result, Err(GatewayError::UnauthorizedSession(_, _))));
}

#[tokio::test]
async fn an_idled_browser_is_handed_back_out_by_the_same_id() {
    let driver = Arc::new(MockDriver::new());
    let mut cfg = tiny_config();
    cfg.max_browsers = 1;
    let manager = PoolManager::new(cfg, driver, Arc::new(NullObserver)).unwrap();

    let s1 = SessionId::new();
    let inst = manager.acquire(s1, now_ms() + 5_000).await.unwrap();
    manager.release(inst.id, s1).await.unwrap();

    let s2 = SessionId::new();
    let reacquired = manager.acquire(s2, now_ms() + 5_000).await.unwrap();
    assert_eq!(reacquired.id, inst.id);
}

#[tokio::test]
async fn a_destroyed_browser_is_never_handed_out_again() {
    let driver = Arc::new(MockDriver::new());
    let mut cfg = tiny_config();
    cfg.max_browsers = 1;
    cfg.recycle_after_uses = 1;
    let manager = PoolManager::new(cfg, driver, Arc::new(NullObserver)).unwrap();

    let s1 = SessionId::new();
    let inst = manager.acquire(s1, now_ms() + 5_000).await.unwrap();
    manager.release(inst.id, s1).await.unwrap(); // recycled: use_count hit the limit

    let s2 = SessionId::new();
    let next = manager.acquire(s2, now_ms() + 5_000).await.unwrap();
    assert_ne!(next.id, inst.id);

    let stale_release = manager.release(inst.id, s1).await;
    assert!(matches!(stale_release, Err(GatewayError::NotFound(_))));
}

#[tokio::test]
async fn waiters_are_served_strictly_in_arrival_order() {
    let driver = Arc::new(MockDriver::new());
    let mut cfg = tiny_config();
    cfg.max_browsers = 1;
    cfg.max_queue_length = 5;
    let manager = PoolManager::new(cfg, driver, Arc::new(NullObserver)).unwrap();

    let holder = SessionId::new();
    let inst = manager.acquire(holder, now_ms() + 5_000).await.unwrap();

    let sessions: Vec<SessionId> = (0..3).map(|_| SessionId::new()).collect();
    let mut tasks = Vec::new();
    for s in &sessions {
        let m = manager.clone();
        let s = *s;
        tasks.push(tokio::spawn(async move { m.acquire(s, now_ms() + 5_000).await }));
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    let mut current_owner = holder;
    let mut current_id = inst.id;
    let mut served_order = Vec::new();
    for _ in &sessions {
        manager.release(current_id, current_owner).await.unwrap();
        let handled = tasks.remove(0).await.unwrap().unwrap();
        served_order.push(handled.owner.unwrap());
        current_owner = handled.owner.unwrap();
        current_id = handled.id;
    }
    assert_eq!(served_order, sessions);
}

#[tokio::test(start_paused = true)]
async fn no_completion_is_delivered_after_a_waiters_deadline_passes() {
    let driver = Arc::new(MockDriver::new());
    let mut cfg = tiny_config();
    cfg.max_browsers = 1;
    cfg.max_queue_length = 5;
    let manager = PoolManager::new(cfg, driver, Arc::new(NullObserver)).unwrap();

    let holder = SessionId::new();
    let inst = manager.acquire(holder, now_ms() + 5_000).await.unwrap();

    let waiter = SessionId::new();
    let result = manager.acquire(waiter, now_ms() + 50).await;
    assert!(matches!(result, Err(GatewayError::Timeout)));

    manager.release(inst.id, holder).await.unwrap();
    let listed = manager.list_instances().await;
    assert_eq!(listed[0].state, InstanceState::Idle);
    assert_eq!(listed[0].owner, None);
}

#[tokio::test]
async fn circuit_open_fails_fast_without_attempting_a_launch() {
    let driver = Arc::new(MockDriver::new());
    let mut cfg = tiny_config();
    cfg.max_browsers = 3;
    cfg.failure_threshold = 1;
    cfg.minimum_requests = 1_000;
    cfg.recovery_timeout_ms = 60_000;
    let manager = PoolManager::new(cfg, driver.clone(), Arc::new(NullObserver)).unwrap();
    driver.fail_next_launches(1);

    let s1 = SessionId::new();
    assert!(manager.acquire(s1, now_ms() + 1_000).await.is_err());

    let s2 = SessionId::new();
    let result = manager.acquire(s2, now_ms() + 1_000).await;
    assert!(matches!(result, Err(GatewayError::CircuitOpen)));
    assert_eq!(driver.live_browser_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn recycler_never_destroys_an_active_instance() {
    let driver = Arc::new(MockDriver::new());
    let mut cfg = tiny_config();
    cfg.max_browsers = 1;
    cfg.recycling_threshold = 0;
    cfg.maintenance_tick_ms = 10;
    let manager = PoolManager::new(cfg, driver, Arc::new(NullObserver)).unwrap();
    manager.initialize().await.unwrap();

    let session = SessionId::new();
    let inst = manager.acquire(session, now_ms() + 5_000).await.unwrap();

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let listed = manager.list_instances().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, inst.id);
    assert_eq!(listed[0].state, InstanceState::Active);
}

#[tokio::test]
async fn shutdown_is_idempotent_and_rejects_further_acquisitions() {
    let driver = Arc::new(MockDriver::new());
    let manager = PoolManager::new(tiny_config(), driver.clone(), Arc::new(NullObserver)).unwrap();
    manager.initialize().await.unwrap();

    let session = SessionId::new();
    manager.acquire(session, now_ms() + 5_000).await.unwrap();

    manager.shutdown(true).await.unwrap();
    manager.shutdown(true).await.unwrap();
    assert_eq!(driver.live_browser_count(), 0);

    let result = manager.acquire(SessionId::new(), now_ms() + 5_000).await;
    assert!(matches!(result, Err(GatewayError::ShuttingDown)));
}

#[tokio::test]
async fn use_count_is_monotonic_and_pool_never_exceeds_max_browsers() {
    let driver = Arc::new(MockDriver::new());
    let mut cfg = tiny_config();
    cfg.max_browsers = 1;
    cfg.recycle_after_uses = 1_000;
    let manager = PoolManager::new(cfg, driver, Arc::new(NullObserver)).unwrap();

    let mut last_use_count = 0;
    for _ in 0..5 {
        let session = SessionId::new();
        let inst = manager.acquire(session, now_ms() + 5_000).await.unwrap();
        assert!(inst.use_count > last_use_count);
        last_use_count = inst.use_count;
        assert!(manager.list_instances().await.len() <= 1);
        manager.release(inst.id, session).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn health_escalation_on_an_active_instance_notifies_without_destroying_it() {
    let driver = Arc::new(MockDriver::new());
    let mut cfg = tiny_config();
    cfg.max_browsers = 1;
    cfg.health_check_interval_ms = 10;
    cfg.response_timeout_ms = 50;
    let observer = Arc::new(RecordingObserver::default());
    let manager = PoolManager::new(cfg, driver.clone(), observer.clone()).unwrap();
    manager.initialize().await.unwrap();

    let session = SessionId::new();
    let inst = manager.acquire(session, now_ms() + 5_000).await.unwrap();
    driver.disconnect(&BrowserHandle("mock-browser-1".to_string()));

    let mut restarted = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if observer
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, GatewayEvent::BrowserRestarted { .. }))
        {
            restarted = true;
            break;
        }
    }
    assert!(restarted, "expected a restart notification within a bounded number of ticks");

    let listed = manager.list_instances().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, inst.id);
    assert_eq!(listed[0].state, InstanceState::Active);
}
