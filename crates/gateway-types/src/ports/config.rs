//! Configuration surface consumed by the pool core.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{GatewayError, GatewayResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_browsers: usize,
    pub min_browsers: usize,
    pub max_pages_per_browser: usize,
    pub idle_timeout_ms: u64,
    pub health_check_interval_ms: u64,
    pub response_timeout_ms: u64,
    pub acquisition_timeout_ms: u64,
    pub recycle_after_uses: u64,
    pub max_age_ms: u64,
    pub max_memory_per_browser_mb: u64,
    pub max_cpu_per_browser: f32,
    pub recycling_threshold: u8,
    pub max_batch_size: usize,
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub max_scale_step: usize,
    pub failure_threshold: u64,
    pub failure_rate_threshold: f64,
    pub minimum_requests: u64,
    pub recovery_timeout_ms: u64,
    pub success_threshold: u64,
    pub max_queue_length: usize,
    pub emergency_queue_len: usize,
    pub maintenance_tick_ms: u64,
    pub recycling_cooldown_ms: u64,
    pub scale_up_cooldown_ms: u64,
    pub scale_down_cooldown_ms: u64,
    pub trend_window: usize,
    pub launch_options: Value,
    pub recycler_weights: RecyclerWeights,
}

/// Weights the Recycler's composite score assigns to each signal.
/// Configuration, not a hard-coded constant — the pack this workspace is
/// grounded on never documents a canonical set, so these are tunable per
/// deployment the same way every other pool threshold is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RecyclerWeights {
    pub age: f64,
    pub use_count: f64,
    pub memory: f64,
    pub cpu: f64,
    pub unresponsive: f64,
    pub page_leak: f64,
    pub error_rate: f64,
}

impl Default for RecyclerWeights {
    fn default() -> Self {
        Self {
            age: 0.15,
            use_count: 0.15,
            memory: 0.15,
            cpu: 0.15,
            unresponsive: 0.2,
            page_leak: 0.1,
            error_rate: 0.1,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_browsers: 10,
            min_browsers: 1,
            max_pages_per_browser: 10,
            idle_timeout_ms: 5 * 60_000,
            health_check_interval_ms: 30_000,
            response_timeout_ms: 5_000,
            acquisition_timeout_ms: 30_000,
            recycle_after_uses: 100,
            max_age_ms: 60 * 60_000,
            max_memory_per_browser_mb: 512,
            max_cpu_per_browser: 80.0,
            recycling_threshold: 60,
            max_batch_size: 3,
            scale_up_threshold: 80.0,
            scale_down_threshold: 20.0,
            max_scale_step: 2,
            failure_threshold: 5,
            failure_rate_threshold: 50.0,
            minimum_requests: 10,
            recovery_timeout_ms: 30_000,
            success_threshold: 3,
            max_queue_length: 100,
            emergency_queue_len: 5,
            maintenance_tick_ms: 60_000,
            recycling_cooldown_ms: 30_000,
            scale_up_cooldown_ms: 30_000,
            scale_down_cooldown_ms: 60_000,
            trend_window: 15,
            launch_options: Value::Null,
            recycler_weights: RecyclerWeights::default(),
        }
    }
}

impl PoolConfig {
    /// Validates cross-field invariants; returns `InvalidConfig` on the
    /// first violation found.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.min_browsers > self.max_browsers {
            return Err(GatewayError::InvalidConfig(
                "minBrowsers must be <= maxBrowsers".into(),
            ));
        }
        if self.max_pages_per_browser == 0 {
            return Err(GatewayError::InvalidConfig(
                "maxPagesPerBrowser must be >= 1".into(),
            ));
        }
        if self.recycling_threshold > 100 {
            return Err(GatewayError::InvalidConfig(
                "recyclingThreshold must be in [0, 100]".into(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(GatewayError::InvalidConfig(
                "maxBatchSize must be >= 1".into(),
            ));
        }
        if self.scale_down_threshold > self.scale_up_threshold {
            return Err(GatewayError::InvalidConfig(
                "scaleDownThreshold must be <= scaleUpThreshold".into(),
            ));
        }
        if self.trend_window < 2 {
            return Err(GatewayError::InvalidConfig(
                "trend window must track at least 2 samples".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PoolConfig::default().validate().unwrap();
    }

    #[test]
    fn min_greater_than_max_is_rejected() {
        let cfg = PoolConfig {
            min_browsers: 5,
            max_browsers: 2,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_page_limit_is_rejected() {
        let cfg = PoolConfig {
            max_pages_per_browser: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
