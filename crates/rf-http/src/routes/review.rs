// SPDX-License-Identifier: MIT

//! `POST /sessions/:id/review`: the HTTP side of the human review mutation
//! path (C11). The reviewer's identity is read off a header rather than a
//! full auth system, since this surface sits behind the bearer-token
//! guardrail already and has no notion of individual operator accounts.

use axum::extract::{Path, State};
use axum::Json;
use rf_core::{Clock, SystemClock};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const UNKNOWN_REVIEWER: &str = "unknown";

#[derive(Deserialize)]
pub struct ReviewBody {
    pub run_id: String,
    pub action: String,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewedSession {
    pub session_id: String,
    pub review_status: Option<rf_core::ReviewStatus>,
}

#[derive(Deserialize)]
pub struct SessionIdPath {
    id: String,
}

pub async fn review(
    State(state): State<AppState>,
    Path(SessionIdPath { id }): Path<SessionIdPath>,
    headers: axum::http::HeaderMap,
    Json(body): Json<ReviewBody>,
) -> Result<Json<ReviewedSession>, ApiError> {
    let reviewer_id = headers
        .get("x-reviewer-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN_REVIEWER)
        .to_string();

    let request = rf_engine::ReviewRequest {
        run_id: body.run_id,
        session_id: id,
        action: body.action,
        reason: body.reason,
        reviewer_id,
    };

    let now = SystemClock.now();
    let session = rf_engine::review::apply(&state.store, request, now)?;

    Ok(Json(ReviewedSession {
        session_id: session
            .backend_session_id
            .clone()
            .unwrap_or_else(|| session.finding.id.to_string()),
        review_status: session.review_status,
    }))
}
