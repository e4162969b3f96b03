// SPDX-License-Identifier: MIT

//! Spawns `rf-runner` as a detached background process, one per run,
//! mirroring the detached-child-process pattern the teacher's
//! `cli/src/daemon_process.rs` uses to start `ojd`: no pipes wired to this
//! process, PID recorded to disk so a future process can check liveness.

use std::path::Path;
use std::process::Stdio;

use rf_core::RunMode;
use tokio::process::Command;

use crate::error::ApiError;

fn mode_arg(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Mock => "mock",
        RunMode::Live => "live",
        RunMode::Hybrid => "hybrid",
    }
}

/// Spawn the run supervisor binary for `run_id` and record its PID under
/// `runs/<run_id>/pid`. `.kill_on_drop(false)` is required here: this
/// `Command` handle is dropped at the end of the request handler, and the
/// default tokio behavior of killing the child on drop would tear down the
/// run the instant the HTTP response is sent.
#[allow(clippy::too_many_arguments)]
pub async fn spawn(
    runner_bin: &Path,
    root: &Path,
    playbooks_dir: &Path,
    run_id: &str,
    mode: RunMode,
    wave_size: u32,
    connected_repos: &[String],
) -> Result<u32, ApiError> {
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
        .stderr(Stdio::null())
        .kill_on_drop(false);

    if !connected_repos.is_empty() {
        command.arg("--connected-repos").arg(connected_repos.join(","));
    }

    let child = command
        .spawn()
        .map_err(|err| ApiError::Internal(format!("failed to spawn rf-runner: {err}")))?;

    let pid = child
        .id()
        .ok_or_else(|| ApiError::Internal("rf-runner exited before its pid could be read".to_string()))?;

    let pid_path = root.join("runs").join(run_id).join("pid");
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| ApiError::Internal(err.to_string()))?;
    }
    std::fs::write(&pid_path, pid.to_string()).map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(pid)
}
