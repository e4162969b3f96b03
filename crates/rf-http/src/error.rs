// SPDX-License-Identifier: MIT

//! Maps the handful of error sources a handler can hit to an HTTP
//! response. Kept as one small enum here rather than threading per-crate
//! error types through `IntoResponse` impls in their own crates, since the
//! boundary is the only place that needs to know the HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<rf_engine::ReviewError> for ApiError {
    fn from(err: rf_engine::ReviewError) -> Self {
        match err {
            rf_engine::ReviewError::SessionNotFound(id) => ApiError::NotFound(format!("session not found: {id}")),
            rf_engine::ReviewError::InvalidRunId(id) => ApiError::BadRequest(format!("invalid run id: {id}")),
            rf_engine::ReviewError::InvalidAction(action) => {
                ApiError::BadRequest(format!("invalid review action: {action}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<rf_storage::StateStoreError> for ApiError {
    fn from(err: rf_storage::StateStoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<rf_ingest::IngestError> for ApiError {
    fn from(err: rf_ingest::IngestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
