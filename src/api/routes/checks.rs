//! Single check statistics endpoint

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::check::CheckId;
use crate::check::stats::CheckStatsSnapshot;

/// GET /api/v1/checks/:id
///
/// Returns the runtime stats of one check instance (e.g. `http:homepage`)
pub async fn get_check_stats(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CheckStatsSnapshot>> {
    let id = CheckId::from(id);

    state
        .runner
        .store()
        .stats(&id)
        .map(|stats| Json(stats.snapshot()))
        .ok_or_else(|| ApiError::NotFound(format!("no stats recorded for check {id}")))
}
