use axum::extract::State;
use axum::Json;
use gateway_types::{BrowserInstance, CircuitState, PoolMetricsSnapshot};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PoolSnapshot {
    pub instances: Vec<BrowserInstance>,
    pub circuit: CircuitState,
}

pub async fn pool_snapshot(State(state): State<AppState>) -> Json<PoolSnapshot> {
    Json(PoolSnapshot {
        instances: state.pool.list_instances().await,
        circuit: state.pool.circuit_state(),
    })
}

pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<PoolMetricsSnapshot> {
    Json(state.pool.metrics_snapshot().await)
}
