// SPDX-License-Identifier: MIT

//! Per-concern error enums (one per component, never a single crate-wide
//! error type) matching the teacher's `WalError`/`SnapshotError`/
//! `CheckpointError` layout.

use rf_agent::AgentBackendError;
use rf_storage::{AtomicIoError, LockError, MemoryStoreError, StateStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Backend(#[from] AgentBackendError),
    #[error(transparent)]
    Storage(#[from] StateStoreError),
    #[error(transparent)]
    Ledger(#[from] AtomicIoError),
    #[error("run is in live/hybrid mode but no live backend was configured")]
    LiveBackendNotConfigured,
}

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("missing credentials for {mode} mode")]
    MissingCredentials { mode: &'static str },
    #[error("remote backend is unreachable: {0}")]
    BackendUnreachable(String),
    #[error("missing playbook for category {0}")]
    MissingPlaybook(String),
    #[error("hybrid mode requires a non-empty connected-repos list")]
    EmptyConnectedRepos,
    #[error("no findings to run")]
    NoFindings,
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("run id contains invalid characters: {0}")]
    InvalidRunId(String),
    #[error("invalid review action: {0}")]
    InvalidAction(String),
    #[error(transparent)]
    Storage(#[from] StateStoreError),
    #[error(transparent)]
    Lock(#[from] LockError),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Preflight(#[from] PreflightError),
    #[error(transparent)]
    Storage(#[from] StateStoreError),
    #[error(transparent)]
    Memory(#[from] MemoryStoreError),
}
