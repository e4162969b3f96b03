// SPDX-License-Identifier: MIT

//! `GET /status`: legacy single-run view, kept for callers that predate the
//! multi-run index. Always reads the most-recently-persisted run's pointer
//! file rather than a specific run id, and is marked `Deprecation: true`.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rf_core::BatchRun;

use crate::error::ApiError;
use crate::middleware::deprecation_headers;
use crate::state::AppState;

pub async fn status(State(state): State<AppState>) -> Result<Response, ApiError> {
    let run: Option<BatchRun> = rf_storage::read_json_tolerant(&state.store.legacy_state_path())
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    match run {
        Some(run) => Ok((deprecation_headers(), Json(run)).into_response()),
        None => Ok((deprecation_headers(), ApiError::NotFound("no run has completed yet".to_string())).into_response()),
    }
}
