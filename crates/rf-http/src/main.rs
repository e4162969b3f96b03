// SPDX-License-Identifier: MIT

//! `rf-httpd`: the HTTP boundary process. Reads its configuration from the
//! environment (mirroring `rf-engine::EngineConfig::from_env`'s style),
//! builds the router, and serves until the process is signaled to stop.

use std::path::PathBuf;

use rf_http::AppState;

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let root = env_path("RF_STATE_ROOT", "./rf-state");
    let playbooks_dir = env_path("RF_PLAYBOOKS_DIR", "./playbooks");
    let runner_bin = env_path("RF_RUNNER_BIN", "./rf-runner");
    let max_acu_per_session = env_u32("RF_MAX_ACU_PER_SESSION", 5);
    let bind_addr = std::env::var("RF_HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    std::fs::create_dir_all(&root)?;

    let state = AppState::new(root, playbooks_dir, runner_bin, max_acu_per_session);
    let app = rf_http::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "rf-httpd listening");

    axum::serve(listener, app).await?;
    Ok(())
}
