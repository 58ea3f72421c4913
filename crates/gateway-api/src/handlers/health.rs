use axum::extract::State;
use axum::Json;
use gateway_types::CircuitStateKind;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub circuit: CircuitStateKind,
    pub pool_size: usize,
    pub max_browsers: usize,
}

/// Liveness/readiness probe. Unhealthy when the circuit is open — load
/// balancers should stop routing acquisitions here until it recovers.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.pool.metrics_snapshot().await;
    let circuit = state.pool.circuit_state();
    Json(HealthResponse {
        healthy: !matches!(circuit.state, CircuitStateKind::Open),
        circuit: circuit.state,
        pool_size: snapshot.size,
        max_browsers: snapshot.max_browsers,
    })
}
