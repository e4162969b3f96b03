// SPDX-License-Identifier: MIT

//! `rf review <run-id> <session-id> <approved|rejected>` — the operator
//! side of the human-in-the-loop review path (C11), applied through the
//! same `rf_engine::review::apply` the HTTP boundary calls.

use anyhow::Result;
use clap::Args;
use rf_core::SystemClock;
use rf_engine::review::{apply, ReviewRequest};
use rf_storage::StateStore;
use std::path::Path;

use crate::env;
use crate::output::{emit, OutputFormat};

#[derive(Args)]
pub struct ReviewArgs {
    /// Run id the session belongs to
    pub run_id: String,
    /// Session id (backend session id or finding id)
    pub session_id: String,
    /// approved or rejected
    pub action: String,
    /// Optional free-text reason
    #[arg(long)]
    pub reason: Option<String>,
}

pub fn run(root: &Path, args: ReviewArgs, output: OutputFormat) -> Result<()> {
    let store = StateStore::new(root, SystemClock);
    let request = ReviewRequest {
        run_id: args.run_id,
        session_id: args.session_id,
        action: args.action,
        reason: args.reason,
        reviewer_id: env::reviewer_id(),
    };
    let session = apply(&store, request, chrono::Utc::now())?;

    emit(output, &session, |s| {
        println!(
            "session {} review={:?} reviewer={:?} version={}",
            s.finding.id.as_str(),
            s.review_status,
            s.reviewer_id,
            s.version
        );
    })
}
