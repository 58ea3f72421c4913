//! Scaler decision types.

use serde::{Deserialize, Serialize};

use crate::instance::TimestampMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingKind {
    None,
    ScaleUp,
    ScaleDown,
    EmergencyScaleUp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingDecision {
    pub kind: ScalingKind,
    pub previous_size: usize,
    pub new_size: usize,
    /// Confidence in [0, 100].
    pub confidence: u8,
    pub rationale: String,
    pub at: TimestampMs,
}

impl ScalingDecision {
    pub fn none(size: usize, at: TimestampMs) -> Self {
        Self {
            kind: ScalingKind::None,
            previous_size: size,
            new_size: size,
            confidence: 100,
            rationale: "no scaling trigger met".to_string(),
            at,
        }
    }
}

/// Snapshot of the signals the Scaler reads.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScalingSignals {
    pub utilization_percent: f64,
    pub queue_length: usize,
    pub avg_wait_ms: f64,
    pub error_rate: f64,
    pub avg_acquire_latency_ms: f64,
    pub host_cpu_percent: f32,
    pub host_memory_percent: f32,
    pub pool_size: usize,
}
