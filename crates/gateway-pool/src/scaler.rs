//! Scaler: reads metrics, decides grow/shrink/emergency.

use gateway_types::{now_ms, PoolConfig, ScalingDecision, ScalingKind, ScalingSignals, TimestampMs};
use parking_lot::Mutex;

const TREND_EPSILON: f64 = 0.01;

pub struct Scaler {
    last_scale_up_at: Mutex<Option<TimestampMs>>,
    last_scale_down_at: Mutex<Option<TimestampMs>>,
}

impl Scaler {
    pub fn new() -> Self {
        Self {
            last_scale_up_at: Mutex::new(None),
            last_scale_down_at: Mutex::new(None),
        }
    }

    fn up_in_cooldown(&self, now: TimestampMs, cooldown_ms: u64) -> bool {
        self.last_scale_up_at
            .lock()
            .is_some_and(|t| now.saturating_sub(t) < cooldown_ms)
    }

    fn down_in_cooldown(&self, now: TimestampMs, cooldown_ms: u64) -> bool {
        self.last_scale_down_at
            .lock()
            .is_some_and(|t| now.saturating_sub(t) < cooldown_ms)
    }

    /// Evaluates the decision rules in order. `trend_slope` is
    /// the linear slope over the last `trendWindow` utilization samples;
    /// a slope greater than a small epsilon counts as "increasing".
    pub fn decide(
        &self,
        signals: &ScalingSignals,
        config: &PoolConfig,
        trend_slope: f64,
    ) -> ScalingDecision {
        let now = now_ms();
        let size = signals.pool_size;

        // 1. Emergency scale-up bypasses the scale-up cooldown.
        if signals.utilization_percent >= 90.0
            && signals.queue_length >= config.emergency_queue_len
            && size < config.max_browsers
        {
            let headroom = config.max_browsers - size;
            let step = (config.max_scale_step * 2).min(headroom).max(1);
            let new_size = size + step;
            *self.last_scale_up_at.lock() = Some(now);
            return ScalingDecision {
                kind: ScalingKind::EmergencyScaleUp,
                previous_size: size,
                new_size,
                confidence: 95,
                rationale: format!(
                    "utilization {:.1}% with queue {} >= emergency threshold {}",
                    signals.utilization_percent, signals.queue_length, config.emergency_queue_len
                ),
                at: now,
            };
        }

        // 2. Scale up.
        let trend_increasing = trend_slope > TREND_EPSILON;
        if size < config.max_browsers && !self.up_in_cooldown(now, config.scale_up_cooldown_ms) {
            if signals.utilization_percent >= config.scale_up_threshold
                || (signals.queue_length > 0 && trend_increasing)
            {
                let headroom = config.max_browsers - size;
                let step = config.max_scale_step.min(headroom).max(1);
                let new_size = size + step;
                *self.last_scale_up_at.lock() = Some(now);
                return ScalingDecision {
                    kind: ScalingKind::ScaleUp,
                    previous_size: size,
                    new_size,
                    confidence: 75,
                    rationale: format!(
                        "utilization {:.1}%, queue {}, trend_slope {:.3}",
                        signals.utilization_percent, signals.queue_length, trend_slope
                    ),
                    at: now,
                };
            }
        }

        // 3. Scale down.
        if size > config.min_browsers
            && signals.utilization_percent <= config.scale_down_threshold
            && signals.queue_length == 0
            && !self.down_in_cooldown(now, config.scale_down_cooldown_ms)
        {
            let new_size = size - 1;
            *self.last_scale_down_at.lock() = Some(now);
            return ScalingDecision {
                kind: ScalingKind::ScaleDown,
                previous_size: size,
                new_size,
                confidence: 70,
                rationale: format!(
                    "utilization {:.1}% <= scale-down threshold {:.1}% with empty queue",
                    signals.utilization_percent, config.scale_down_threshold
                ),
                at: now,
            };
        }

        ScalingDecision::none(size, now)
    }
}

impl Default for Scaler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PoolConfig {
        PoolConfig {
            max_browsers: 10,
            min_browsers: 1,
            scale_up_threshold: 80.0,
            scale_down_threshold: 20.0,
            max_scale_step: 2,
            emergency_queue_len: 5,
            scale_up_cooldown_ms: 0,
            scale_down_cooldown_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn emergency_scale_up_when_saturated_and_queued() {
        let scaler = Scaler::new();
        let signals = ScalingSignals {
            utilization_percent: 95.0,
            queue_length: 6,
            pool_size: 4,
            ..Default::default()
        };
        let decision = scaler.decide(&signals, &config(), 0.0);
        assert_eq!(decision.kind, ScalingKind::EmergencyScaleUp);
        assert_eq!(decision.new_size, 8);
    }

    #[test]
    fn scale_up_on_high_utilization() {
        let scaler = Scaler::new();
        let signals = ScalingSignals {
            utilization_percent: 85.0,
            queue_length: 0,
            pool_size: 4,
            ..Default::default()
        };
        let decision = scaler.decide(&signals, &config(), 0.0);
        assert_eq!(decision.kind, ScalingKind::ScaleUp);
        assert_eq!(decision.new_size, 6);
    }

    #[test]
    fn scale_down_when_idle_and_above_minimum() {
        let scaler = Scaler::new();
        let signals = ScalingSignals {
            utilization_percent: 5.0,
            queue_length: 0,
            pool_size: 4,
            ..Default::default()
        };
        let decision = scaler.decide(&signals, &config(), 0.0);
        assert_eq!(decision.kind, ScalingKind::ScaleDown);
        assert_eq!(decision.new_size, 3);
    }

    #[test]
    fn no_decision_when_nothing_triggers() {
        let scaler = Scaler::new();
        let signals = ScalingSignals {
            utilization_percent: 50.0,
            queue_length: 0,
            pool_size: 4,
            ..Default::default()
        };
        let decision = scaler.decide(&signals, &config(), 0.0);
        assert_eq!(decision.kind, ScalingKind::None);
    }

    #[test]
    fn scale_up_cooldown_blocks_a_second_decision() {
        let scaler = Scaler::new();
        let mut cfg = config();
        cfg.scale_up_cooldown_ms = 60_000;
        let signals = ScalingSignals {
            utilization_percent: 95.0,
            queue_length: 0,
            pool_size: 4,
            ..Default::default()
        };
        let first = scaler.decide(&signals, &cfg, 0.0);
        assert_eq!(first.kind, ScalingKind::ScaleUp);
        let second = scaler.decide(&signals, &cfg, 0.0);
        assert_eq!(second.kind, ScalingKind::None);
    }
}
