// SPDX-License-Identifier: MIT

//! `rf-runner`: the per-run supervisor binary (C10). Spawned once per run
//! by `rf-http`'s upload handler or by `rf-cli spawn`, always as a detached
//! child process recording its own pid under `runs/<run_id>/pid`. Reads the
//! findings CSV already persisted to disk, drives the run to completion or
//! interruption, then exits — there is no resident state in this process
//! beyond the lifetime of one run.
//!
//! `#[tokio::main(flavor = "multi_thread", worker_threads = 2)]` is used
//! purely so the HTTP client and timers get their own IO driver threads;
//! the scheduler's own concurrency remains the single-process,
//! semaphore-gated model described in §5 — not OS-thread parallelism.

use clap::Parser;
use rf_core::{RunMode, SystemClock};
use rf_engine::{EngineConfig, Supervisor, SupervisorParams};
use rf_ingest::ServiceWeights;
use rf_storage::StateStore;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "rf-runner")]
struct Args {
    /// Run id this process drives to completion
    #[arg(long = "run-id")]
    run_id: String,

    /// State root (must match the boundary that spawned this process)
    #[arg(long = "root")]
    root: PathBuf,

    /// Directory of `<category>.md` playbook files
    #[arg(long = "playbooks-dir")]
    playbooks_dir: PathBuf,

    /// mock, live, or hybrid
    #[arg(long = "mode", default_value = "mock")]
    mode: String,

    /// Sessions dispatched per wave
    #[arg(long = "wave-size", default_value_t = 10)]
    wave_size: usize,

    /// Connected repository names, comma-separated (hybrid mode only)
    #[arg(long = "connected-repos", value_delimiter = ',', default_value = "")]
    connected_repos: Vec<String>,
}

fn parse_mode(raw: &str) -> RunMode {
    match raw {
        "live" => RunMode::Live,
        "hybrid" => RunMode::Hybrid,
        _ => RunMode::Mock,
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mode = parse_mode(&args.mode);
    let connected_repos: Vec<String> = args.connected_repos.into_iter().filter(|s| !s.is_empty()).collect();

    let store = StateStore::new(&args.root, SystemClock);
    let csv_path = store.findings_csv_path(&args.run_id);
    let csv_bytes = match std::fs::read(&csv_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(run_id = %args.run_id, path = %csv_path.display(), error = %err, "failed to read findings csv");
            return std::process::ExitCode::FAILURE;
        }
    };

    let findings = match rf_ingest::parse_csv(csv_bytes.as_slice(), &ServiceWeights::default(), 5000) {
        Ok(findings) => findings,
        Err(err) => {
            tracing::error!(run_id = %args.run_id, error = %err, "failed to parse findings csv");
            return std::process::ExitCode::FAILURE;
        }
    };

    let cancellation = CancellationToken::new();
    install_signal_handlers(cancellation.clone());

    let config = EngineConfig::from_env();
    let supervisor = Supervisor::new(&args.root, &args.playbooks_dir, config, SystemClock);

    let params = SupervisorParams {
        run_id: args.run_id.clone(),
        mode,
        wave_size: args.wave_size,
        connected_repos,
        live_bearer_token: std::env::var("RF_LIVE_BEARER_TOKEN").ok(),
        live_base_url: std::env::var("RF_LIVE_BASE_URL").ok(),
    };

    match supervisor.run(params, findings, &cancellation).await {
        Ok(run) => {
            tracing::info!(run_id = %args.run_id, status = ?run.status, completed = run.completed, "run finished");
            std::process::ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(run_id = %args.run_id, error = %err, "run failed");
            std::process::ExitCode::FAILURE
        }
    }
}

/// Cooperative interrupt handling per §4.10/§5: `SIGINT`/`SIGTERM` flip the
/// cancellation token, which the scheduler observes between wave
/// boundaries (and immediately during any retry back-off), rather than
/// tearing the process down mid-request.
fn install_signal_handlers(cancellation: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    cancellation.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("interrupt received, finishing in-flight polls and stopping before the next wave");
        cancellation.cancel();
    });
}
