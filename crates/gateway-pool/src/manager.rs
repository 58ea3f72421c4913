//! Pool Manager: the single owner of instance state.
//!
//! All mutable pool state — the instance map, driver handles, page handles,
//! health records and the waiter queue — lives behind one `tokio::sync::Mutex`
//! (`PoolState`). A single lock keeps acquire/release/destroy linearized
//! without a lock-ordering problem; every critical section here is kept
//! short and never awaits while held. Launching a browser is genuinely slow,
//! so it happens outside the lock against a `reserved` counter that holds the
//! budget slot while the launch is in flight.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gateway_types::{
    now_ms, Actor, Alert, AlertSeverity, AuditRecord, AuditResult, BrowserHandle, BrowserId,
    BrowserInstance, GatewayError, GatewayEvent, GatewayResult, HealthRecord, InstanceState,
    LifecycleDriver, PageHandle, PageId, PoolConfig, PoolMetricsSnapshot, PoolObserver,
    RecycleReason, ScalingKind, ScalingSignals, SessionId, TimestampMs,
};
use tokio::sync::{oneshot, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::circuit::{CircuitBreaker, CircuitConfig};
use crate::health::HealthMonitor;
use crate::metrics::{self, AlertThreshold, MetricsRegistry};
use crate::recycler::{self, Recycler};
use crate::scaler::Scaler;
use crate::waiter::Waiter;

const UTILIZATION_ALERT: AlertThreshold = AlertThreshold {
    warning: 85.0,
    critical: 97.0,
};

// No per-host percent field exists on `PoolConfig` (only a per-browser
// memory budget in MB), so host memory pressure uses the same fixed
// warning/critical band as utilization rather than a config-derived one.
const HOST_MEMORY_ALERT: AlertThreshold = AlertThreshold {
    warning: 85.0,
    critical: 97.0,
};

#[derive(Default)]
struct PoolState {
    instances: HashMap<BrowserId, BrowserInstance>,
    handles: HashMap<BrowserId, BrowserHandle>,
    page_handles: HashMap<PageId, PageHandle>,
    health: HashMap<BrowserId, HealthRecord>,
    waiters: VecDeque<Waiter>,
    reserved: usize,
    next_seq: u64,
    shutting_down: bool,
    /// Active instances the Recycler scored above `recyclingThreshold`
    /// during a maintenance tick. An Active instance is never destroyed
    /// directly; `release()` consults this set and recycles on checkout
    /// return instead of idling the instance back into the pool.
    pending_recycle: HashSet<BrowserId>,
}

fn recycle_reason_label(reason: RecycleReason) -> String {
    serde_json::to_value(reason)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "recycled".to_string())
}

fn pick_lru_idle(instances: &HashMap<BrowserId, BrowserInstance>) -> Option<BrowserId> {
    instances
        .values()
        .filter(|i| i.state == InstanceState::Idle)
        .min_by(|a, b| a.last_used_at.cmp(&b.last_used_at).then(a.id.cmp(&b.id)))
        .map(|i| i.id)
}

/// Drops waiters from the front of the queue whose deadline has already
/// passed — their own timer resolves independently to `Timeout` — until it
/// finds one still live, or the queue is empty.
fn pop_next_live_waiter(state: &mut PoolState, now: TimestampMs) -> Option<Waiter> {
    while let Some(front) = state.waiters.pop_front() {
        if front.deadline > now {
            return Some(front);
        }
    }
    None
}

enum LaunchAttempt {
    Launched(BrowserId),
    NoCapacity,
    Failed(GatewayError),
}

pub struct PoolManager {
    config: PoolConfig,
    driver: Arc<dyn LifecycleDriver>,
    observer: Arc<dyn PoolObserver>,
    circuit: CircuitBreaker,
    metrics: MetricsRegistry,
    recycler: Recycler,
    scaler: Scaler,
    health_monitor: HealthMonitor,
    state: TokioMutex<PoolState>,
    initialized: AtomicBool,
    background: TokioMutex<Vec<JoinHandle<()>>>,
}

impl PoolManager {
    pub fn new(
        config: PoolConfig,
        driver: Arc<dyn LifecycleDriver>,
        observer: Arc<dyn PoolObserver>,
    ) -> GatewayResult<Arc<Self>> {
        config.validate()?;
        let circuit = CircuitBreaker::new(CircuitConfig {
            failure_threshold: config.failure_threshold,
            failure_rate_threshold: config.failure_rate_threshold,
            minimum_requests: config.minimum_requests,
            recovery_timeout_ms: config.recovery_timeout_ms,
            success_threshold: config.success_threshold,
        });
        let recycler = Recycler::new(config.recycler_weights);
        Ok(Arc::new(Self {
            health_monitor: HealthMonitor::new(config.response_timeout_ms),
            config,
            driver,
            observer,
            circuit,
            metrics: MetricsRegistry::new(),
            recycler,
            scaler: Scaler::new(),
            state: TokioMutex::new(PoolState::default()),
            initialized: AtomicBool::new(false),
            background: TokioMutex::new(Vec::new()),
        }))
    }

    /// Starts the maintenance and health-check background loops. Calling
    /// this twice on the same pool is an error rather than a silent no-op —
    /// a double-init usually means two callers each think they own startup.
    pub async fn initialize(self: &Arc<Self>) -> GatewayResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyInitialized);
        }
        let maintenance = {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(
                    this.config.maintenance_tick_ms.max(1),
                ));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    this.maintenance_tick().await;
                }
            })
        };
        let health = {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(
                    this.config.health_check_interval_ms.max(1),
                ));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    this.health_tick().await;
                }
            })
        };
        self.background.lock().await.extend([maintenance, health]);
        info!("pool manager initialized");
        Ok(())
    }

    // ---- public operations ----------------------------------

    pub async fn acquire(
        &self,
        session_id: SessionId,
        deadline_ms: TimestampMs,
    ) -> GatewayResult<BrowserInstance> {
        let permit = self.circuit.try_acquire()?;
        let started = now_ms();
        let result = self.acquire_inner(session_id, deadline_ms).await;

        let latency = now_ms().saturating_sub(started) as f64;
        if let Some(alert) = self.metrics.record_with_alert(
            metrics::ACQUIRE_LATENCY,
            latency,
            self.timeout_alert(self.config.acquisition_timeout_ms),
        ) {
            self.emit_alert(alert).await;
        }
        if let Some(alert) = self.metrics.record_with_alert(
            metrics::ERROR_RATE,
            if result.is_err() { 100.0 } else { 0.0 },
            self.error_rate_alert(),
        ) {
            self.emit_alert(alert).await;
        }

        match &result {
            Ok(_) => self.circuit.on_success(permit),
            Err(GatewayError::LaunchFailed(_)) => self.circuit.on_failure(permit),
            Err(_) => {}
        }
        result
    }

    async fn acquire_inner(
        &self,
        session_id: SessionId,
        deadline_ms: TimestampMs,
    ) -> GatewayResult<BrowserInstance> {
        {
            let mut state = self.state.lock().await;
            if state.shutting_down {
                return Err(GatewayError::ShuttingDown);
            }
            if let Some(id) = pick_lru_idle(&state.instances) {
                let inst = state.instances.get_mut(&id).expect("just located by id");
                inst.mark_active(session_id);
                let snapshot = inst.clone();
                drop(state);
                self.emit_acquired(&snapshot, session_id).await;
                return Ok(snapshot);
            }
        }

        match self.try_launch().await {
            LaunchAttempt::Launched(id) => {
                let mut state = self.state.lock().await;
                let inst = state
                    .instances
                    .get_mut(&id)
                    .expect("try_launch just inserted this id");
                inst.mark_active(session_id);
                let snapshot = inst.clone();
                drop(state);
                self.emit_acquired(&snapshot, session_id).await;
                Ok(snapshot)
            }
            LaunchAttempt::Failed(err) => Err(err),
            LaunchAttempt::NoCapacity => {
                let now = now_ms();
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    return Err(GatewayError::ShuttingDown);
                }
                if state.waiters.len() >= self.config.max_queue_length {
                    return Err(GatewayError::QueueFull);
                }
                let (tx, rx) = oneshot::channel();
                let seq = state.next_seq;
                state.next_seq += 1;
                state.waiters.push_back(Waiter {
                    session_id,
                    arrival: now,
                    deadline: deadline_ms,
                    seq,
                    tx,
                });
                drop(state);
                let wait_ms = deadline_ms.saturating_sub(now);
                self.await_waiter(rx, seq, wait_ms, now).await
            }
        }
    }

    async fn await_waiter(
        &self,
        mut rx: oneshot::Receiver<GatewayResult<BrowserInstance>>,
        seq: u64,
        wait_ms: u64,
        arrival: TimestampMs,
    ) -> GatewayResult<BrowserInstance> {
        tokio::select! {
            res = &mut rx => {
                let outcome = res.unwrap_or(Err(GatewayError::Timeout));
                if outcome.is_ok() {
                    self.metrics.record(
                        metrics::QUEUE_WAIT_TIME,
                        now_ms().saturating_sub(arrival) as f64,
                    );
                }
                outcome
            }
            _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => {
                let mut state = self.state.lock().await;
                state.waiters.retain(|w| w.seq != seq);
                Err(GatewayError::Timeout)
            }
        }
    }

    pub async fn release(&self, browser_id: BrowserId, session_id: SessionId) -> GatewayResult<()> {
        let now = now_ms();
        let started = now;
        enum Outcome {
            Destroyed(BrowserHandle, RecycleReason),
            Idled,
        }
        let outcome = {
            let mut state = self.state.lock().await;
            let inst = state
                .instances
                .get_mut(&browser_id)
                .ok_or(GatewayError::NotFound(browser_id))?;
            if inst.owner != Some(session_id) {
                return Err(GatewayError::UnauthorizedSession(session_id, browser_id));
            }
            let unhealthy = state
                .health
                .get(&browser_id)
                .is_some_and(|h| !h.healthy);
            let marked_for_recycle = state.pending_recycle.remove(&browser_id);
            // The 4th recycle trigger alongside use-count/age/health: the
            // maintenance loop already scored this instance above
            // `recyclingThreshold` while it was checked out and marked it,
            // so honor that mark here rather than silently idling it back
            // into the pool forever.
            let trigger = if inst.use_count >= self.config.recycle_after_uses {
                Some(RecycleReason::UseCount)
            } else if inst.age_ms(now) >= self.config.max_age_ms {
                Some(RecycleReason::Age)
            } else if unhealthy {
                Some(RecycleReason::Unresponsive)
            } else if marked_for_recycle {
                Some(RecycleReason::ForcedByScaler)
            } else {
                None
            };
            if let Some(reason) = trigger {
                inst.mark_recycling();
                state.instances.remove(&browser_id);
                state.health.remove(&browser_id);
                match state.handles.remove(&browser_id) {
                    Some(handle) => Outcome::Destroyed(handle, reason),
                    None => return Err(GatewayError::Internal("missing driver handle".into())),
                }
            } else {
                inst.mark_idle();
                Outcome::Idled
            }
        };

        self.emit_released(browser_id, session_id, now).await;
        if let Some(alert) = self.metrics.record_with_alert(
            metrics::RELEASE_LATENCY,
            now_ms().saturating_sub(started) as f64,
            self.timeout_alert(self.config.response_timeout_ms),
        ) {
            self.emit_alert(alert).await;
        }

        match outcome {
            Outcome::Destroyed(handle, reason) => {
                let _ = self.driver.close(&handle).await;
                self.observer
                    .on_event(GatewayEvent::BrowserRecycled {
                        browser_id,
                        reason: recycle_reason_label(reason),
                        at: now_ms(),
                    })
                    .await;
                self.serve_waiter_via_launch().await;
            }
            Outcome::Idled => {
                self.serve_idle_waiters().await;
            }
        }
        Ok(())
    }

    pub async fn create_page(
        &self,
        browser_id: BrowserId,
        session_id: SessionId,
    ) -> GatewayResult<PageId> {
        let handle = {
            let state = self.state.lock().await;
            let inst = state
                .instances
                .get(&browser_id)
                .ok_or(GatewayError::NotFound(browser_id))?;
            if inst.owner != Some(session_id) {
                return Err(GatewayError::UnauthorizedSession(session_id, browser_id));
            }
            if inst.page_count() >= self.config.max_pages_per_browser {
                return Err(GatewayError::PageLimitReached(browser_id));
            }
            state
                .handles
                .get(&browser_id)
                .cloned()
                .ok_or_else(|| GatewayError::Internal("missing driver handle".into()))?
        };

        let started = now_ms();
        let page_handle = self.driver.new_page(&handle).await?;
        self.metrics.record(
            metrics::PAGE_CREATION_TIME,
            now_ms().saturating_sub(started) as f64,
        );
        let page_id = PageId::new();
        let mut state = self.state.lock().await;
        if let Some(inst) = state.instances.get_mut(&browser_id) {
            inst.pages.insert(page_id, ());
        }
        state.page_handles.insert(page_id, page_handle);
        Ok(page_id)
    }

    pub async fn close_page(
        &self,
        browser_id: BrowserId,
        session_id: SessionId,
        page_id: PageId,
    ) -> GatewayResult<()> {
        let page_handle = {
            let mut state = self.state.lock().await;
            let inst = state
                .instances
                .get_mut(&browser_id)
                .ok_or(GatewayError::NotFound(browser_id))?;
            if inst.owner != Some(session_id) {
                return Err(GatewayError::UnauthorizedSession(session_id, browser_id));
            }
            if inst.pages.remove(&page_id).is_none() {
                return Err(GatewayError::PageNotFound(page_id));
            }
            state.page_handles.remove(&page_id)
        };
        if let Some(handle) = page_handle {
            self.driver.close_page(&handle).await?;
        }
        Ok(())
    }

    pub async fn list_instances(&self) -> Vec<BrowserInstance> {
        self.state.lock().await.instances.values().cloned().collect()
    }

    pub fn circuit_state(&self) -> gateway_types::CircuitState {
        self.circuit.snapshot()
    }

    pub async fn metrics_snapshot(&self) -> PoolMetricsSnapshot {
        let (active, idle, recycling, size, queue_length) = {
            let state = self.state.lock().await;
            let active = state
                .instances
                .values()
                .filter(|i| i.state == InstanceState::Active)
                .count();
            let idle = state
                .instances
                .values()
                .filter(|i| i.state == InstanceState::Idle)
                .count();
            let recycling = state
                .instances
                .values()
                .filter(|i| i.state == InstanceState::Recycling)
                .count();
            (active, idle, recycling, state.instances.len(), state.waiters.len())
        };
        let utilization_percent = if self.config.max_browsers > 0 {
            active as f64 / self.config.max_browsers as f64 * 100.0
        } else {
            0.0
        };
        PoolMetricsSnapshot {
            active,
            idle,
            recycling,
            size,
            max_browsers: self.config.max_browsers,
            utilization_percent,
            queue_length,
            acquire_latency: self.metrics.stats(metrics::ACQUIRE_LATENCY),
            release_latency: self.metrics.stats(metrics::RELEASE_LATENCY),
            queue_wait_time: self.metrics.stats(metrics::QUEUE_WAIT_TIME),
            error_rate: self.metrics.stats(metrics::ERROR_RATE).mean,
            host: *self.metrics.host.lock(),
        }
    }

    /// Idempotent: a second call observes `shutting_down` already set and
    /// returns immediately without re-draining or re-aborting anything.
    pub async fn shutdown(&self, force: bool) -> GatewayResult<()> {
        let already = {
            let mut state = self.state.lock().await;
            let was = state.shutting_down;
            state.shutting_down = true;
            was
        };
        if already {
            return Ok(());
        }

        for handle in self.background.lock().await.drain(..) {
            handle.abort();
        }

        let (waiters, handles) = {
            let mut state = self.state.lock().await;
            let active_count = state
                .instances
                .values()
                .filter(|i| i.state == InstanceState::Active)
                .count();
            if !force && active_count > 0 {
                warn!(active_count, "shutdown requested with active instances still checked out");
            }
            let waiters: Vec<Waiter> = state.waiters.drain(..).collect();
            let handles: Vec<BrowserHandle> = state.handles.drain().map(|(_, h)| h).collect();
            state.instances.clear();
            state.health.clear();
            state.page_handles.clear();
            (waiters, handles)
        };

        for waiter in waiters {
            let _ = waiter.tx.send(Err(GatewayError::ShuttingDown));
        }
        for handle in handles {
            let _ = self.driver.close(&handle).await;
        }
        info!("pool manager shut down");
        Ok(())
    }

    // ---- internal helpers -------------------------------------------------

    /// Reserves a launch budget slot and launches a new browser outside the
    /// lock. `NoCapacity` means the pool is already at `maxBrowsers` (minus
    /// whatever is mid-launch); the caller decides what to do with that.
    async fn try_launch(&self) -> LaunchAttempt {
        {
            let mut state = self.state.lock().await;
            if state.instances.len() + state.reserved >= self.config.max_browsers {
                return LaunchAttempt::NoCapacity;
            }
            state.reserved += 1;
        }
        match self.driver.launch(&self.config.launch_options).await {
            Ok(handle) => {
                let pid = self.driver.pid(&handle).await;
                let id = BrowserId::new();
                let inst = BrowserInstance::new(id, pid);
                {
                    let mut state = self.state.lock().await;
                    state.reserved -= 1;
                    state.instances.insert(id, inst);
                    state.handles.insert(id, handle);
                }
                self.emit_created(id).await;
                LaunchAttempt::Launched(id)
            }
            Err(e) => {
                let mut state = self.state.lock().await;
                state.reserved -= 1;
                LaunchAttempt::Failed(GatewayError::LaunchFailed(e.to_string()))
            }
        }
    }

    /// Hands freed idle instances to queued waiters, oldest waiter first,
    /// until either runs out. Called after a release that didn't recycle.
    async fn serve_idle_waiters(&self) {
        loop {
            let outcome = {
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    None
                } else {
                    let now = now_ms();
                    match pick_lru_idle(&state.instances) {
                        Some(id) => pop_next_live_waiter(&mut state, now).map(|waiter| {
                            let inst = state.instances.get_mut(&id).expect("just located by id");
                            inst.mark_active(waiter.session_id);
                            (waiter, inst.clone())
                        }),
                        None => None,
                    }
                }
            };
            match outcome {
                Some((waiter, inst)) => {
                    self.emit_acquired(&inst, waiter.session_id).await;
                    let _ = waiter.tx.send(Ok(inst));
                }
                None => break,
            }
        }
    }

    /// Called after a destruction frees launch budget: attempts exactly one
    /// new launch on behalf of the front waiter. A launch failure here
    /// leaves the waiter queued rather than retrying in a loop.
    async fn serve_waiter_via_launch(&self) {
        let has_waiter = {
            let state = self.state.lock().await;
            !state.shutting_down && !state.waiters.is_empty()
        };
        if !has_waiter {
            return;
        }
        match self.try_launch().await {
            LaunchAttempt::Launched(id) => {
                let now = now_ms();
                let handed = {
                    let mut state = self.state.lock().await;
                    match pop_next_live_waiter(&mut state, now) {
                        Some(waiter) => {
                            let inst = state.instances.get_mut(&id).expect("just launched");
                            inst.mark_active(waiter.session_id);
                            Some((waiter, inst.clone()))
                        }
                        None => None,
                    }
                };
                if let Some((waiter, inst)) = handed {
                    self.emit_acquired(&inst, waiter.session_id).await;
                    let _ = waiter.tx.send(Ok(inst));
                }
            }
            LaunchAttempt::NoCapacity | LaunchAttempt::Failed(_) => {}
        }
    }

    async fn build_scaling_signals(&self) -> ScalingSignals {
        let (pool_size, active, queue_length) = {
            let state = self.state.lock().await;
            let active = state
                .instances
                .values()
                .filter(|i| i.state == InstanceState::Active)
                .count();
            (state.instances.len(), active, state.waiters.len())
        };
        let utilization_percent = if self.config.max_browsers > 0 {
            active as f64 / self.config.max_browsers as f64 * 100.0
        } else {
            0.0
        };
        ScalingSignals {
            utilization_percent,
            queue_length,
            avg_wait_ms: self.metrics.stats(metrics::QUEUE_WAIT_TIME).mean,
            error_rate: self.metrics.stats(metrics::ERROR_RATE).mean,
            avg_acquire_latency_ms: self.metrics.stats(metrics::ACQUIRE_LATENCY).mean,
            host_cpu_percent: self.metrics.host.lock().cpu_usage_percent,
            host_memory_percent: 0.0,
            pool_size,
        }
    }

    async fn record_pool_metrics(&self) {
        let (size, active, queue_length) = {
            let state = self.state.lock().await;
            let active = state
                .instances
                .values()
                .filter(|i| i.state == InstanceState::Active)
                .count();
            (state.instances.len(), active, state.waiters.len())
        };
        self.metrics.record(metrics::POOL_SIZE, size as f64);
        self.metrics.record(metrics::ACTIVE_COUNT, active as f64);
        self.metrics.record(metrics::QUEUE_LENGTH, queue_length as f64);
        let utilization = if self.config.max_browsers > 0 {
            active as f64 / self.config.max_browsers as f64 * 100.0
        } else {
            0.0
        };
        if let Some(alert) = self.metrics.record_with_alert(
            metrics::UTILIZATION_PERCENT,
            utilization,
            UTILIZATION_ALERT,
        ) {
            self.emit_alert(alert).await;
        }

        let host = *self.metrics.host.lock();
        let memory_total_mb = host.memory_used_mb + host.memory_free_mb;
        let memory_percent = if memory_total_mb > 0 {
            host.memory_used_mb as f64 / memory_total_mb as f64 * 100.0
        } else {
            0.0
        };
        if let Some(alert) = self.metrics.record_with_alert(
            metrics::HOST_CPU_PERCENT,
            host.cpu_usage_percent as f64,
            self.host_cpu_alert(),
        ) {
            self.emit_alert(alert).await;
        }
        if let Some(alert) = self.metrics.record_with_alert(
            metrics::HOST_MEMORY_PERCENT,
            memory_percent,
            HOST_MEMORY_ALERT,
        ) {
            self.emit_alert(alert).await;
        }

        let acquire_latency = self.metrics.last(metrics::ACQUIRE_LATENCY).unwrap_or(0.0);
        self.check_anomaly(metrics::ACQUIRE_LATENCY, acquire_latency).await;
        let error_rate = self.metrics.last(metrics::ERROR_RATE).unwrap_or(0.0);
        self.check_anomaly(metrics::ERROR_RATE, error_rate).await;
    }

    async fn destroy_instance(&self, browser_id: BrowserId, reason: &str) {
        let handle = {
            let mut state = self.state.lock().await;
            state.instances.remove(&browser_id);
            state.health.remove(&browser_id);
            state.pending_recycle.remove(&browser_id);
            state.handles.remove(&browser_id)
        };
        if let Some(handle) = handle {
            let _ = self.driver.close(&handle).await;
        }
        let at = now_ms();
        self.observer
            .on_event(GatewayEvent::BrowserRemoved {
                browser_id,
                reason: reason.to_string(),
                at,
            })
            .await;
        self.observer
            .on_audit(AuditRecord {
                event_type: "browser.removed".to_string(),
                at,
                actor: Actor::System,
                resource: browser_id.to_string(),
                result: AuditResult::Success,
                reason: Some(reason.to_string()),
            })
            .await;
        self.serve_waiter_via_launch().await;
    }

    async fn emit_created(&self, browser_id: BrowserId) {
        let at = now_ms();
        self.observer
            .on_event(GatewayEvent::BrowserCreated { browser_id, at })
            .await;
        self.observer
            .on_audit(AuditRecord {
                event_type: "browser.created".to_string(),
                at,
                actor: Actor::System,
                resource: browser_id.to_string(),
                result: AuditResult::Success,
                reason: None,
            })
            .await;
    }

    async fn emit_acquired(&self, inst: &BrowserInstance, session_id: SessionId) {
        let at = now_ms();
        self.observer
            .on_event(GatewayEvent::BrowserAcquired {
                browser_id: inst.id,
                session_id,
                at,
            })
            .await;
        self.observer
            .on_audit(AuditRecord {
                event_type: "browser.acquired".to_string(),
                at,
                actor: Actor::Session(session_id),
                resource: inst.id.to_string(),
                result: AuditResult::Success,
                reason: None,
            })
            .await;
    }

    async fn emit_released(&self, browser_id: BrowserId, session_id: SessionId, at: TimestampMs) {
        self.observer
            .on_event(GatewayEvent::BrowserReleased {
                browser_id,
                session_id,
                at,
            })
            .await;
        self.observer
            .on_audit(AuditRecord {
                event_type: "browser.released".to_string(),
                at,
                actor: Actor::Session(session_id),
                resource: browser_id.to_string(),
                result: AuditResult::Success,
                reason: None,
            })
            .await;
    }

    /// Warning at half of `timeout_ms`, critical at the timeout itself —
    /// a latency that long is already indistinguishable from the caller's
    /// own timeout firing.
    fn timeout_alert(&self, timeout_ms: u64) -> AlertThreshold {
        let critical = timeout_ms as f64;
        AlertThreshold {
            warning: critical * 0.5,
            critical,
        }
    }

    fn error_rate_alert(&self) -> AlertThreshold {
        AlertThreshold {
            warning: self.config.failure_rate_threshold * 0.5,
            critical: self.config.failure_rate_threshold,
        }
    }

    fn host_cpu_alert(&self) -> AlertThreshold {
        AlertThreshold {
            warning: self.config.max_cpu_per_browser as f64,
            critical: 95.0,
        }
    }

    async fn emit_alert(&self, alert: Alert) {
        self.observer
            .on_event(GatewayEvent::PoolAlert {
                details: alert.message,
                at: alert.at,
            })
            .await;
    }

    /// Flags an anomalous reading against its own trailing baseline and
    /// emits a `pool:alert` event, independent of the fixed-threshold
    /// alerts `record_with_alert` already covers — a value can be well
    /// under threshold and still be a sharp, sudden deviation.
    async fn check_anomaly(&self, name: &'static str, value: f64) {
        if self.metrics.is_anomalous(name, value) {
            self.emit_alert(Alert {
                metric: name.to_string(),
                severity: AlertSeverity::Warning,
                value,
                threshold: 0.0,
                at: now_ms(),
                message: format!("{name} = {value:.2} deviates sharply from its recent baseline"),
            })
            .await;
        }
    }

    // ---- background loops --------------------------------------------------

    async fn health_tick(&self) {
        *self.metrics.host.lock() = crate::health::sample_host();

        let snapshot: Vec<(BrowserId, BrowserHandle, Option<u32>, Option<HealthRecord>, InstanceState)> = {
            let state = self.state.lock().await;
            state
                .instances
                .values()
                .filter_map(|inst| {
                    state.handles.get(&inst.id).map(|h| {
                        (
                            inst.id,
                            h.clone(),
                            inst.pid,
                            state.health.get(&inst.id).cloned(),
                            inst.state,
                        )
                    })
                })
                .collect()
        };

        for (id, handle, pid, previous, inst_state) in snapshot {
            let started = now_ms();
            let record = self
                .health_monitor
                .check(self.driver.as_ref(), &handle, pid, previous.as_ref())
                .await;
            self.metrics.record(
                metrics::HEALTH_CHECK_DURATION,
                now_ms().saturating_sub(started) as f64,
            );
            let verdict = HealthMonitor::verdict(&record);
            {
                let mut state = self.state.lock().await;
                state.health.insert(id, record);
            }
            if verdict == gateway_types::HealthVerdict::Escalate {
                match inst_state {
                    InstanceState::Idle => self.destroy_instance(id, "unhealthy").await,
                    InstanceState::Active => {
                        self.observer
                            .on_event(GatewayEvent::BrowserRestarted {
                                browser_id: id,
                                reason: "unhealthy_pending_release".to_string(),
                                at: now_ms(),
                            })
                            .await;
                    }
                    _ => {}
                }
            }
        }
    }

    async fn maintenance_tick(&self) {
        let now = now_ms();

        let idle_expired: Vec<BrowserId> = {
            let state = self.state.lock().await;
            state
                .instances
                .values()
                .filter(|i| i.state == InstanceState::Idle && i.idle_ms(now) > self.config.idle_timeout_ms)
                .map(|i| i.id)
                .collect()
        };
        for id in idle_expired {
            self.destroy_instance(id, "idle_timeout").await;
        }

        if !self.recycler.in_cooldown(now, self.config.recycling_cooldown_ms) {
            let candidates = {
                let state = self.state.lock().await;
                recycler::candidates(
                    &state.instances,
                    &state.health,
                    &self.config,
                    &self.recycler.weights(),
                    now,
                )
            };
            let batch = recycler::select_batch(candidates, self.config.max_batch_size);
            if !batch.is_empty() {
                for candidate in &batch {
                    let is_idle = {
                        let state = self.state.lock().await;
                        state
                            .instances
                            .get(&candidate.browser_id)
                            .map(|i| i.state == InstanceState::Idle)
                            .unwrap_or(false)
                    };
                    // Active instances are never destroyed directly; mark
                    // the instance so the next release() recycles it
                    // instead of returning it to Idle.
                    if !is_idle {
                        let mut state = self.state.lock().await;
                        state.pending_recycle.insert(candidate.browser_id);
                        continue;
                    }
                    self.destroy_instance(candidate.browser_id, "recycled").await;
                }
                self.recycler.mark_recycled(now);
            }
        }

        let signals = self.build_scaling_signals().await;
        let trend = self.metrics.slope(metrics::UTILIZATION_PERCENT);
        let decision = self.scaler.decide(&signals, &self.config, trend);
        match decision.kind {
            ScalingKind::ScaleUp | ScalingKind::EmergencyScaleUp => {
                let growth = decision.new_size.saturating_sub(decision.previous_size);
                for _ in 0..growth {
                    if matches!(self.try_launch().await, LaunchAttempt::Failed(_)) {
                        break;
                    }
                }
                self.serve_idle_waiters().await;
                self.observer
                    .on_event(GatewayEvent::PoolScaled {
                        previous_size: decision.previous_size,
                        new_size: decision.new_size,
                        reason: decision.rationale.clone(),
                        at: decision.at,
                    })
                    .await;
            }
            ScalingKind::ScaleDown => {
                let candidate = {
                    let state = self.state.lock().await;
                    pick_lru_idle(&state.instances)
                };
                if let Some(id) = candidate {
                    self.destroy_instance(id, "scaled_down").await;
                    self.observer
                        .on_event(GatewayEvent::PoolScaled {
                            previous_size: decision.previous_size,
                            new_size: decision.new_size,
                            reason: decision.rationale.clone(),
                            at: decision.at,
                        })
                        .await;
                }
            }
            ScalingKind::None => {}
        }

        self.record_pool_metrics().await;
    }
}
