// SPDX-License-Identifier: MIT

//! `rf show <run-id>` — the full `BatchRun`, the same payload `GET
//! /runs/:id` returns.

use anyhow::{bail, Result};
use clap::Args;
use rf_core::SystemClock;
use rf_storage::StateStore;
use std::path::Path;

use crate::output::{emit, OutputFormat};

#[derive(Args)]
pub struct ShowArgs {
    /// Run id to show
    pub run_id: String,
}

pub fn run(root: &Path, args: ShowArgs, output: OutputFormat) -> Result<()> {
    let store = StateStore::new(root, SystemClock);
    let Some(batch_run) = store.read_run_state(&args.run_id)? else {
        bail!("run not found: {}", args.run_id);
    };

    emit(output, &batch_run, |run| {
        println!(
            "run {}  status={:?}  mode={:?}  wave {}/{}",
            run.id.as_str(),
            run.status,
            run.mode,
            run.current_wave,
            run.waves.len()
        );
        println!(
            "  total={} completed={} successful={} failed={} prs={}",
            run.total_findings, run.completed, run.successful, run.failed, run.prs_created
        );
        println!();
        println!(
            "{:<24} {:<10} {:<10} {:<8} {:<10}",
            "FINDING", "STATE", "ATTEMPT", "WAVE", "REVIEW"
        );
        for session in &run.sessions {
            println!(
                "{:<24} {:<10} {:<10} {:<8} {:<10}",
                session.finding.id.as_str(),
                session.state.to_string(),
                session.attempt,
                session.wave_number,
                session
                    .review_status
                    .map(|s| format!("{s:?}").to_lowercase())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    })
}
