// SPDX-License-Identifier: MIT

//! `GET /eval`: per-category remediation health for the latest run.

use axum::extract::State;
use axum::Json;
use rf_engine::CategoryMetrics;

use crate::error::ApiError;
use crate::routes::runs::latest_run_id;
use crate::state::AppState;

pub async fn eval(State(state): State<AppState>) -> Result<Json<Vec<CategoryMetrics>>, ApiError> {
    let Some(run_id) = latest_run_id(&state)? else {
        return Ok(Json(Vec::new()));
    };
    let run = state
        .store
        .read_run_state(run_id.as_str())?
        .ok_or_else(|| ApiError::Internal("latest run vanished between index read and state read".to_string()))?;
    Ok(Json(rf_engine::eval_metrics(&run)))
}
