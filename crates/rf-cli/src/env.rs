// SPDX-License-Identifier: MIT

//! Environment-derived defaults shared across subcommands.

use std::path::PathBuf;

pub fn state_root() -> PathBuf {
    std::env::var("RF_STATE_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./rf-state"))
}

pub fn playbooks_dir() -> PathBuf {
    std::env::var("RF_PLAYBOOKS_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./playbooks"))
}

pub fn runner_bin() -> PathBuf {
    std::env::var("RF_RUNNER_BIN").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("rf-runner"))
}

pub fn reviewer_id() -> String {
    std::env::var("RF_REVIEWER_ID")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string())
}
