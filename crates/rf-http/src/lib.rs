// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-http: the HTTP boundary (C12) — upload-and-spawn a run, list and
//! inspect runs, mutate a session's review status, and read the `/eval` and
//! `/ops` metric surfaces. Thin by design: every handler parses a request,
//! calls into `rf-engine`/`rf-storage`/`rf-ingest`, and serializes the
//! result. No orchestration logic lives in this crate.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod run_id;
pub mod runner;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

pub use state::AppState;

/// Build the full router: routes plus the guardrail middleware stack.
/// Layers apply outside-in for the request and inside-out for the
/// response, so the cheapest, most request-rejecting checks (rate limit,
/// content-type) sit closest to the handler and the identity checks
/// (bearer auth, origin) wrap around them.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/runs", post(routes::runs::create_run).get(routes::runs::list_runs))
        .route("/runs/{id}", get(routes::runs::get_run))
        .route("/sessions/{id}/review", post(routes::review::review))
        .route("/eval", get(routes::eval::eval))
        .route("/ops", get(routes::ops::ops))
        .route("/status", get(routes::status::status))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::content_type_guard))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::origin_guard))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::bearer_auth))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}
