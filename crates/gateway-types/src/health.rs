//! Per-instance health observations.

use serde::{Deserialize, Serialize};

use crate::instance::TimestampMs;

/// Rolling observation written by the Health Monitor. OS-level sampling is
/// best-effort: fields are `None` rather than the check failing outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    pub healthy: bool,
    pub responsive: bool,
    pub memory_mb: Option<u64>,
    pub cpu_percent: Option<f32>,
    pub open_pages: Option<usize>,
    pub last_check_at: TimestampMs,
    pub last_error: Option<String>,
    /// Count of consecutive unhealthy results, used for the
    /// three-strikes escalation rule.
    pub consecutive_unhealthy: u32,
}

impl HealthRecord {
    pub fn healthy_now(at: TimestampMs) -> Self {
        Self {
            healthy: true,
            responsive: true,
            memory_mb: None,
            cpu_percent: None,
            open_pages: None,
            last_check_at: at,
            last_error: None,
            consecutive_unhealthy: 0,
        }
    }
}

/// Latest resource sample for a single instance, plus host-level figures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ResourceUsage {
    pub memory_rss_mb: u64,
    pub cpu_percent: f32,
    pub open_handles: usize,
    pub connection_count: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct HostUsage {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_free_mb: u64,
    pub load_average: f32,
}

/// The verdict the Health Monitor produces after a single check cycle,
/// consumed by the Pool Manager to decide Idle-recycle vs. Active-notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Ok,
    /// Unhealthy but not yet past the three-strikes threshold.
    Degraded,
    /// Escalate: recycle now (Idle) or on next release (Active).
    Escalate,
}
