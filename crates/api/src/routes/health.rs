//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::{health, metrics};
use tracing::warn;

use crate::response::HealthResponse;
use crate::state::AppState;

/// Refreshes component health from the warehouse and raw zone.
async fn probe(state: &AppState) {
    match state.warehouse.ping().await {
        Ok(()) => health().warehouse.set_healthy(),
        Err(e) => {
            warn!(error = %e, "Warehouse ping failed");
            health().warehouse.set_unhealthy(e.to_string());
        }
    }

    let raw_zone = state.runner.raw_zone();
    if raw_zone.is_available() {
        health().data_lake.set_healthy();
    } else {
        health()
            .data_lake
            .set_unhealthy(format!("raw zone {} not found", raw_zone.root().display()));
    }
}

/// GET /health - Full health check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    probe(&state).await;
    let report = health().report();
    let finished_at = metrics().last_run_finished_at.get();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        backend: state.warehouse.backend().to_string(),
        warehouse_connected: health().warehouse.is_healthy(),
        data_lake_available: health().data_lake.is_healthy(),
        run_in_progress: state.runner.is_running(),
        last_run_finished_at: (finished_at > 0).then_some(finished_at as i64),
        report,
    })
}

/// GET /health/ready - Readiness probe (can accept traffic).
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    probe(&state).await;
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
