//! Liveness of the worker pool

use axum::{Json, extract::State};
use chrono::Utc;

use crate::api::{state::ApiState, types::HealthResponse};

/// GET /api/v1/health
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let counters = state.runner.status().counters;
    let status = if counters.workers > 0 { "ok" } else { "stopped" };

    Json(HealthResponse {
        status: status.to_string(),
        workers: counters.workers,
        running_checks: counters.running_checks,
        timestamp: Utc::now(),
    })
}
