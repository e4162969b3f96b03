// SPDX-License-Identifier: MIT

//! `POST /runs` (upload-and-spawn), `GET /runs` (index), `GET /runs/:id`
//! (full detail).

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rf_core::{RunId, RunMode, RunSummary};
use rf_ingest::ServiceWeights;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;
use crate::{run_id, runner};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const MAX_ROWS: usize = 5000;
const DEFAULT_WAVE_SIZE: u32 = 5;

pub fn validate_run_id(id: &str) -> Result<(), ApiError> {
    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid run id: {id}")))
    }
}

fn parse_mode(raw: &str) -> Result<RunMode, ApiError> {
    match raw {
        "mock" => Ok(RunMode::Mock),
        "live" => Ok(RunMode::Live),
        "hybrid" => Ok(RunMode::Hybrid),
        other => Err(ApiError::BadRequest(format!("unknown mode: {other}"))),
    }
}

#[derive(Serialize)]
pub struct StartedRun {
    pub run_id: String,
    pub status: &'static str,
}

pub async fn create_run(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut csv_bytes: Option<Vec<u8>> = None;
    let mut wave_size = DEFAULT_WAVE_SIZE;
    let mut mode = RunMode::Mock;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await.map_err(|err| ApiError::BadRequest(err.to_string()))?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::BadRequest("upload exceeds 10MB limit".to_string()));
                }
                csv_bytes = Some(bytes.to_vec());
            }
            "wave_size" => {
                let text = field.text().await.map_err(|err| ApiError::BadRequest(err.to_string()))?;
                let parsed: u32 = text
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("invalid wave_size: {text}")))?;
                if !(1..=100).contains(&parsed) {
                    return Err(ApiError::BadRequest("wave_size must be between 1 and 100".to_string()));
                }
                wave_size = parsed;
            }
            "mode" => {
                let text = field.text().await.map_err(|err| ApiError::BadRequest(err.to_string()))?;
                mode = parse_mode(&text)?;
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    let csv_bytes = csv_bytes.ok_or_else(|| ApiError::BadRequest("missing file field".to_string()))?;
    let findings = rf_ingest::parse_csv(csv_bytes.as_slice(), &ServiceWeights::default(), MAX_ROWS)?;

    let run_id = run_id::generate();
    let csv_path = state.store.findings_csv_path(&run_id);
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| ApiError::Internal(err.to_string()))?;
    }
    std::fs::write(&csv_path, &csv_bytes).map_err(|err| ApiError::Internal(err.to_string()))?;

    tracing::info!(run_id = %run_id, findings = findings.len(), mode = ?mode, "starting run");

    runner::spawn(
        &state.runner_bin,
        &state.root,
        &state.playbooks_dir,
        &run_id,
        mode,
        wave_size,
        &[],
    )
    .await?;

    let body = StartedRun {
        run_id,
        status: "started",
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub async fn list_runs(State(state): State<AppState>) -> Result<Json<Vec<RunSummary>>, ApiError> {
    let index = state.store.read_index()?;
    Ok(Json(index))
}

#[derive(Deserialize)]
pub struct RunIdPath {
    id: String,
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(RunIdPath { id }): Path<RunIdPath>,
) -> Result<Response, ApiError> {
    validate_run_id(&id)?;
    let run = state
        .store
        .read_run_state(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("run not found: {id}")))?;
    Ok(Json(run).into_response())
}

/// Load the most recently started run (the index's last entry), if any.
pub fn latest_run_id(state: &AppState) -> Result<Option<RunId>, ApiError> {
    let index = state.store.read_index()?;
    Ok(index.last().map(|summary| summary.id.clone()))
}
