// SPDX-License-Identifier: MIT

//! `GET /ops`: throughput and resource-consumption metrics for the latest run.

use axum::extract::State;
use axum::Json;
use rf_core::{BatchRun, Clock, RunId, RunMode, SystemClock};
use rf_engine::OpsMetrics;

use crate::error::ApiError;
use crate::routes::runs::latest_run_id;
use crate::state::AppState;

pub async fn ops(State(state): State<AppState>) -> Result<Json<OpsMetrics>, ApiError> {
    let now = SystemClock.now();
    let Some(run_id) = latest_run_id(&state)? else {
        let empty = BatchRun::new(RunId::new("none"), RunMode::Mock, 0, 0, 0, now);
        return Ok(Json(rf_engine::ops_metrics(&empty, state.max_acu_per_session, now)));
    };
    let run = state
        .store
        .read_run_state(run_id.as_str())?
        .ok_or_else(|| ApiError::Internal("latest run vanished between index read and state read".to_string()))?;
    Ok(Json(rf_engine::ops_metrics(&run, state.max_acu_per_session, now)))
}
