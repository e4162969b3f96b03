// SPDX-License-Identifier: MIT

//! `rf spawn` — parse a findings CSV, persist it under the run directory,
//! and hand off to a detached `rf-runner` process, mirroring `POST /runs`
//! in `rf-http` but driven from the operator's terminal instead of an
//! upload.

use anyhow::{bail, Context, Result};
use clap::Args;
use rf_core::{RunMode, SystemClock};
use rf_ingest::ServiceWeights;
use rf_storage::StateStore;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::output::{emit, OutputFormat};
use crate::{env, run_id, runner_process};

const MAX_ROWS: usize = 5000;

#[derive(Args)]
pub struct SpawnArgs {
    /// Path to the scanner findings CSV
    pub csv: PathBuf,

    /// Sessions dispatched per wave (1-100)
    #[arg(long, default_value_t = 5)]
    pub wave_size: u32,

    /// Data source mode: mock, live, or hybrid
    #[arg(long, default_value = "mock")]
    pub mode: String,

    /// Connected repository names, comma-separated (only used in hybrid mode)
    #[arg(long, value_delimiter = ',')]
    pub connected_repos: Vec<String>,
}

#[derive(Serialize)]
struct SpawnResult {
    run_id: String,
    status: &'static str,
    pid: u32,
}

fn parse_mode(raw: &str) -> Result<RunMode> {
    match raw {
        "mock" => Ok(RunMode::Mock),
        "live" => Ok(RunMode::Live),
        "hybrid" => Ok(RunMode::Hybrid),
        other => bail!("unknown mode: {other} (expected mock, live, or hybrid)"),
    }
}

pub async fn run(root: &Path, args: SpawnArgs, output: OutputFormat) -> Result<()> {
    if !(1..=100).contains(&args.wave_size) {
        bail!("wave-size must be between 1 and 100");
    }
    let mode = parse_mode(&args.mode)?;

    let csv_bytes = std::fs::read(&args.csv).with_context(|| format!("reading {}", args.csv.display()))?;
    let findings = rf_ingest::parse_csv(csv_bytes.as_slice(), &ServiceWeights::default(), MAX_ROWS)?;

    let id = run_id::generate();
    let store = StateStore::new(root, SystemClock);
    let csv_path = store.findings_csv_path(&id);
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&csv_path, &csv_bytes)?;

    tracing::info!(run_id = %id, findings = findings.len(), mode = ?mode, "spawning run");

    let playbooks_dir = env::playbooks_dir();
    let runner_bin = env::runner_bin();
    let pid = runner_process::spawn(&runner_bin, root, &playbooks_dir, &id, mode, args.wave_size, &args.connected_repos)?;

    let result = SpawnResult {
        run_id: id,
        status: "started",
        pid,
    };
    emit(output, &result, |r| {
        println!("started run {} (pid {})", r.run_id, r.pid);
    })
}
