// SPDX-License-Identifier: MIT

//! Cross-process advisory file lock used to coordinate every writer of
//! shared per-run state (the engine, the review path, the boundary HTTP
//! surface's upload handler).
//!
//! For a target path `P` the lock file is `P.lock`, holding `{pid, host,
//! started_at, writer}` written via exclusive-create. A holder releases by
//! unlinking the lock file; the guard does this on drop so release happens
//! on every exit path including panics unwinding through it.

use chrono::{DateTime, Utc};
use rf_core::Clock;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock acquisition timed out after {0:?} waiting for {1}")]
    Timeout(Duration, PathBuf),
    #[error("I/O error on lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("lock metadata at {0} is corrupt")]
    CorruptMetadata(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockMetadata {
    pid: u32,
    host: String,
    started_at: DateTime<Utc>,
    writer: String,
}

/// Tunables for lock acquisition. Defaults match the binding staleness and
/// timeout values every writer must honor.
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub stale_after: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        }
    }
}

/// RAII guard over an acquired lock file; unlinks the lock file on drop.
pub struct FileLockGuard {
    lock_path: PathBuf,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.lock_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.lock_path.display(),
                    error = %err,
                    "failed to release file lock"
                );
            }
        }
    }
}

/// Acquire the lock for `target` (the lock file is `target` + `.lock`),
/// blocking the calling thread until acquired, reclaimed, or the configured
/// deadline expires.
pub fn acquire<C: Clock>(
    target: &Path,
    writer: &str,
    config: &LockConfig,
    clock: &C,
) -> Result<FileLockGuard, LockError> {
    let lock_path = lock_path_for(target);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
            path: lock_path.clone(),
            source,
        })?;
    }

    // The contention loop below sleeps on the real wall clock, so the
    // deadline must be tracked against real elapsed time too — an injected
    // `Clock` (e.g. a frozen `FakeClock` in tests) never advances on its
    // own and would make the timeout branch unreachable.
    let started = std::time::Instant::now();
    loop {
        match try_create(&lock_path, writer, clock) {
            Ok(()) => return Ok(FileLockGuard { lock_path }),
            Err(LockError::Io { source, .. }) if source.kind() == std::io::ErrorKind::AlreadyExists => {
                if is_stale(&lock_path, config, clock)? {
                    // Best-effort reclaim: unlink and retry immediately.
                    let _ = std::fs::remove_file(&lock_path);
                    continue;
                }
                if started.elapsed() >= config.timeout {
                    return Err(LockError::Timeout(config.timeout, lock_path));
                }
                std::thread::sleep(config.poll_interval);
            }
            Err(err) => return Err(err),
        }
    }
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut s = target.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

fn try_create<C: Clock>(lock_path: &Path, writer: &str, clock: &C) -> Result<(), LockError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
        .map_err(|source| LockError::Io {
            path: lock_path.to_path_buf(),
            source,
        })?;

    let metadata = LockMetadata {
        pid: std::process::id(),
        host: hostname(),
        started_at: clock.now(),
        writer: writer.to_string(),
    };
    let bytes = serde_json::to_vec(&metadata).map_err(|_| LockError::CorruptMetadata(lock_path.to_path_buf()))?;
    file.write_all(&bytes).map_err(|source| LockError::Io {
        path: lock_path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn is_stale<C: Clock>(lock_path: &Path, config: &LockConfig, clock: &C) -> Result<bool, LockError> {
    let raw = match std::fs::read(lock_path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(source) => {
            return Err(LockError::Io {
                path: lock_path.to_path_buf(),
                source,
            })
        }
    };
    let metadata: LockMetadata = match serde_json::from_slice(&raw) {
        Ok(metadata) => metadata,
        Err(_) => return Ok(true),
    };

    let age = clock.now().signed_duration_since(metadata.started_at);
    let stale_after = chrono::Duration::from_std(config.stale_after).unwrap_or_default();
    if age >= stale_after {
        return Ok(true);
    }
    if metadata.host == hostname() && !is_pid_alive(metadata.pid) {
        return Ok(true);
    }
    Ok(false)
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown-host".to_string())
}

#[cfg(target_os = "linux")]
fn is_pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn is_pid_alive(_pid: u32) -> bool {
    // Conservative: assume alive so staleness falls back to the time-based
    // check on platforms without /proc.
    true
}
