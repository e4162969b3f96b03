// SPDX-License-Identifier: MIT

//! Shared axum handler state: the state store, the configured guardrails,
//! and the path to the `rf-runner` binary this process spawns per upload.

use std::path::PathBuf;
use std::sync::Arc;

use rf_core::SystemClock;
use rf_storage::StateStore;

use crate::middleware::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<StateStore<SystemClock>>,
    pub root: PathBuf,
    pub playbooks_dir: PathBuf,
    pub runner_bin: PathBuf,
    pub max_acu_per_session: u32,
    pub bearer_token: Option<String>,
    pub allowed_origin: Option<String>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(root: PathBuf, playbooks_dir: PathBuf, runner_bin: PathBuf, max_acu_per_session: u32) -> Self {
        Self {
            store: Arc::new(StateStore::new(root.clone(), SystemClock)),
            root,
            playbooks_dir,
            runner_bin,
            max_acu_per_session,
            bearer_token: std::env::var("RF_HTTP_BEARER_TOKEN").ok(),
            allowed_origin: std::env::var("RF_HTTP_ALLOWED_ORIGIN").ok(),
            rate_limiter: RateLimiter::new(),
        }
    }
}
