// SPDX-License-Identifier: MIT

//! `rf list` — the run index, newest last, same ordering `GET /runs` uses.

use anyhow::Result;
use rf_core::SystemClock;
use rf_storage::StateStore;
use std::path::Path;

use crate::output::{emit, OutputFormat};

pub fn run(root: &Path, output: OutputFormat) -> Result<()> {
    let store = StateStore::new(root, SystemClock);
    let index = store.read_index()?;
    emit(output, &index, |rows| {
        if rows.is_empty() {
            println!("no runs yet");
            return;
        }
        println!("{:<10} {:<12} {:<8} {:>6} {:>6} {:>6}", "RUN", "STATUS", "MODE", "TOTAL", "DONE", "FAILED");
        for row in rows {
            println!(
                "{:<10} {:<12} {:<8} {:>6} {:>6} {:>6}",
                row.id.as_str(),
                format!("{:?}", row.status).to_lowercase(),
                format!("{:?}", row.mode).to_lowercase(),
                row.total_findings,
                row.completed,
                row.failed,
            );
        }
    })
}
