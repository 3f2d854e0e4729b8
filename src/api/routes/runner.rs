//! Runner statistics endpoint

use axum::{Json, extract::State};

use crate::api::state::ApiState;
use crate::runner::store::RunnerStatus;

/// GET /api/v1/runner
///
/// Returns the runner counters, the checks currently executing and the
/// runtime stats of every check grouped by check name
pub async fn get_runner_status(State(state): State<ApiState>) -> Json<RunnerStatus> {
    Json(state.runner.status())
}
