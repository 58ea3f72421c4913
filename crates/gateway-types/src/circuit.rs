//! Circuit breaker state machine types.

use serde::{Deserialize, Serialize};

use crate::instance::TimestampMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStateKind {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitState {
    pub state: CircuitStateKind,
    pub failure_count: u64,
    pub success_count: u64,
    pub request_count: u64,
    pub last_transition_at: TimestampMs,
    pub next_probe_at: Option<TimestampMs>,
}

impl CircuitState {
    pub fn closed(at: TimestampMs) -> Self {
        Self {
            state: CircuitStateKind::Closed,
            failure_count: 0,
            success_count: 0,
            request_count: 0,
            last_transition_at: at,
            next_probe_at: None,
        }
    }
}
