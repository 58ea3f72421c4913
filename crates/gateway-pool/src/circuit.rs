//! Circuit breaker in front of `acquire`.
//!
//! The state machine itself follows `riptide-reliability`'s
//! `src/circuit_breaker.rs`: a phase-based lock pattern
//! where the guard is taken, the new state computed, and the guard dropped
//! before anything that might await. Since every transition here is pure
//! bookkeeping (no I/O), the guard is a `parking_lot::Mutex` rather than a
//! tokio one — that makes "never held across an await" a compile-time
//! property instead of a convention to maintain by hand.

use gateway_types::{now_ms, CircuitState, CircuitStateKind, GatewayError, GatewayResult, TimestampMs};
use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct CircuitConfig {
    pub failure_threshold: u64,
    pub failure_rate_threshold: f64,
    pub minimum_requests: u64,
    pub recovery_timeout_ms: u64,
    pub success_threshold: u64,
}

struct Inner {
    state: CircuitStateKind,
    failure_count: u64,
    success_count: u64,
    request_count: u64,
    last_transition_at: TimestampMs,
    next_probe_at: Option<TimestampMs>,
    half_open_probe_inflight: bool,
}

impl Inner {
    fn closed(at: TimestampMs) -> Self {
        Self {
            state: CircuitStateKind::Closed,
            failure_count: 0,
            success_count: 0,
            request_count: 0,
            last_transition_at: at,
            next_probe_at: None,
            half_open_probe_inflight: false,
        }
    }
}

/// A permit returned by [`CircuitBreaker::try_acquire`]. Callers must
/// report the outcome through [`CircuitBreaker::on_success`] or
/// [`CircuitBreaker::on_failure`] exactly once.
pub struct Permit {
    was_probe: bool,
}

pub struct CircuitBreaker {
    config: CircuitConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::closed(now_ms())),
        }
    }

    /// Fails fast with `CircuitOpen` when the breaker is Open, or when it is
    /// HalfOpen and a probe is already in flight: only a small number of
    /// probe requests are allowed through; the remainder fail fast.
    pub fn try_acquire(&self) -> GatewayResult<Permit> {
        let mut inner = self.inner.lock();
        let now = now_ms();
        match inner.state {
            CircuitStateKind::Closed => {
                inner.request_count += 1;
                Ok(Permit { was_probe: false })
            }
            CircuitStateKind::Open => {
                if inner.next_probe_at.is_some_and(|t| now >= t) {
                    info!("circuit breaker: open -> half_open, admitting a probe");
                    inner.state = CircuitStateKind::HalfOpen;
                    inner.last_transition_at = now;
                    inner.success_count = 0;
                    inner.half_open_probe_inflight = true;
                    Ok(Permit { was_probe: true })
                } else {
                    Err(GatewayError::CircuitOpen)
                }
            }
            CircuitStateKind::HalfOpen => {
                if inner.half_open_probe_inflight {
                    Err(GatewayError::CircuitOpen)
                } else {
                    inner.half_open_probe_inflight = true;
                    Ok(Permit { was_probe: true })
                }
            }
        }
    }

    pub fn on_success(&self, permit: Permit) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitStateKind::Closed => {
                inner.failure_count = 0;
            }
            CircuitStateKind::HalfOpen => {
                inner.half_open_probe_inflight = false;
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    info!("circuit breaker: half_open -> closed after consecutive successes");
                    *inner = Inner::closed(now_ms());
                }
            }
            CircuitStateKind::Open => {}
        }
        debug_assert!(permit.was_probe || true);
    }

    pub fn on_failure(&self, _permit: Permit) {
        let mut inner = self.inner.lock();
        let now = now_ms();
        match inner.state {
            CircuitStateKind::Closed => {
                inner.failure_count += 1;
                inner.request_count += 1;
                let failure_rate = if inner.request_count > 0 {
                    inner.failure_count as f64 / inner.request_count as f64 * 100.0
                } else {
                    0.0
                };
                let by_count = inner.failure_count >= self.config.failure_threshold;
                let by_rate = inner.request_count >= self.config.minimum_requests
                    && failure_rate >= self.config.failure_rate_threshold;
                if by_count || by_rate {
                    warn!(
                        failure_count = inner.failure_count,
                        failure_rate, "circuit breaker: closed -> open"
                    );
                    inner.state = CircuitStateKind::Open;
                    inner.last_transition_at = now;
                    inner.next_probe_at = Some(now + self.config.recovery_timeout_ms);
                }
            }
            CircuitStateKind::HalfOpen => {
                warn!("circuit breaker: half_open -> open after probe failure");
                inner.state = CircuitStateKind::Open;
                inner.failure_count = 1;
                inner.success_count = 0;
                inner.half_open_probe_inflight = false;
                inner.last_transition_at = now;
                inner.next_probe_at = Some(now + self.config.recovery_timeout_ms);
            }
            CircuitStateKind::Open => {}
        }
    }

    pub fn snapshot(&self) -> CircuitState {
        let inner = self.inner.lock();
        CircuitState {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            request_count: inner.request_count,
            last_transition_at: inner.last_transition_at,
            next_probe_at: inner.next_probe_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitConfig {
        CircuitConfig {
            failure_threshold: 3,
            failure_rate_threshold: 50.0,
            minimum_requests: 10,
            recovery_timeout_ms: 50,
            success_threshold: 2,
        }
    }

    #[test]
    fn opens_after_failure_threshold_failures() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..3 {
            let permit = cb.try_acquire().unwrap();
            cb.on_failure(permit);
        }
        assert!(matches!(cb.try_acquire(), Err(GatewayError::CircuitOpen)));
    }

    #[test]
    fn half_open_allows_one_probe_then_fails_fast() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..3 {
            let permit = cb.try_acquire().unwrap();
            cb.on_failure(permit);
        }
        std::thread::sleep(std::time::Duration::from_millis(60));
        let probe = cb.try_acquire().unwrap();
        assert!(matches!(cb.try_acquire(), Err(GatewayError::CircuitOpen)));
        cb.on_success(probe);
    }

    #[test]
    fn closes_after_success_threshold_consecutive_probe_successes() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..3 {
            let permit = cb.try_acquire().unwrap();
            cb.on_failure(permit);
        }
        std::thread::sleep(std::time::Duration::from_millis(60));
        let p1 = cb.try_acquire().unwrap();
        cb.on_success(p1);
        std::thread::sleep(std::time::Duration::from_millis(60));
        let p2 = cb.try_acquire().unwrap();
        cb.on_success(p2);
        assert_eq!(cb.snapshot().state, CircuitStateKind::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new(config());
        for _ in 0..3 {
            let permit = cb.try_acquire().unwrap();
            cb.on_failure(permit);
        }
        std::thread::sleep(std::time::Duration::from_millis(60));
        let probe = cb.try_acquire().unwrap();
        cb.on_failure(probe);
        assert!(matches!(cb.try_acquire(), Err(GatewayError::CircuitOpen)));
    }
}
