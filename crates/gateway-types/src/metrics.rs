//! Metrics & alert types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::instance::TimestampMs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub at: TimestampMs,
    pub labels: Option<HashMap<String, String>>,
}

/// The aggregate returned by `getStats(window)`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub metric: String,
    pub severity: AlertSeverity,
    pub value: f64,
    pub threshold: f64,
    pub at: TimestampMs,
    pub message: String,
}

/// A point-in-time view of every series the pool tracks, exposed via
/// `metricsSnapshot()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolMetricsSnapshot {
    pub active: usize,
    pub idle: usize,
    pub recycling: usize,
    pub size: usize,
    pub max_browsers: usize,
    pub utilization_percent: f64,
    pub queue_length: usize,
    pub acquire_latency: SeriesStats,
    pub release_latency: SeriesStats,
    pub queue_wait_time: SeriesStats,
    pub error_rate: f64,
    pub host: crate::health::HostUsage,
}
