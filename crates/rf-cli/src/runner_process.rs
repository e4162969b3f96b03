// SPDX-License-Identifier: MIT

//! Spawns `rf-runner` as a detached background process, the same
//! detached-child-process pattern `rf-http::runner` uses for uploads and
//! the teacher's `cli/src/daemon_process.rs` uses to start `ojd`: no pipes
//! wired to this process, PID recorded under `runs/<run_id>/pid`.

use anyhow::{Context, Result};
use rf_core::RunMode;
use std::path::Path;
use std::process::{Command, Stdio};

fn mode_arg(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Mock => "mock",
        RunMode::Live => "live",
        RunMode::Hybrid => "hybrid",
    }
}

#[allow(clippy::too_many_arguments)]
pub fn spawn(
    runner_bin: &Path,
    root: &Path,
    playbooks_dir: &Path,
    run_id: &str,
    mode: RunMode,
    wave_size: u32,
    connected_repos: &[String],
) -> Result<u32> {
    let mut command = Command::new(runner_bin);
    command
        .arg("--run-id")
        .arg(run_id)
        .arg("--root")
        .arg(root)
        .arg("--playbooks-dir")
        .arg(playbooks_dir)
        .arg("--mode")
        .arg(mode_arg(mode))
        .arg("--wave-size")
        .arg(wave_size.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if !connected_repos.is_empty() {
        command.arg("--connected-repos").arg(connected_repos.join(","));
    }

    let child = command.spawn().with_context(|| format!("failed to spawn {}", runner_bin.display()))?;
    let pid = child.id();

    let pid_path = root.join("runs").join(run_id).join("pid");
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&pid_path, pid.to_string())?;

    Ok(pid)
}
