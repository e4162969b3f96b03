// SPDX-License-Identifier: MIT

//! Session lifecycle state machine and the agent-backend status mapping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal lifecycle state of a `RemediationSession`.
///
/// ```text
/// PENDING -> DISPATCHED -> WORKING -> SUCCESS | FAILED | TIMEOUT
///                                \-> BLOCKED -> FAILED (on timeout)
/// ```
/// `Blocked` is observable but transient: it is always promoted to `Failed`
/// once the session's timeout elapses, so it never counts toward
/// `BatchRun.completed` on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    Dispatched,
    Working,
    Blocked,
    Success,
    Failed,
    Timeout,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LifecycleState::Success | LifecycleState::Failed | LifecycleState::Timeout
        )
    }

    pub fn is_success(self) -> bool {
        matches!(self, LifecycleState::Success)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Dispatched => "dispatched",
            LifecycleState::Working => "working",
            LifecycleState::Blocked => "blocked",
            LifecycleState::Success => "success",
            LifecycleState::Failed => "failed",
            LifecycleState::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

/// Status enum as reported by the agent backend wire protocol. Backends
/// occasionally report a handful of session-lifecycle statuses
/// (`suspend_requested`/`resume_requested`/`resumed`) that have no distinct
/// counterpart in the internal lifecycle; these surface as `Working`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    Working,
    Dispatched,
    Blocked,
    Expired,
    Finished,
    SuspendRequested,
    ResumeRequested,
    Resumed,
}

impl BackendStatus {
    /// Map a backend status onto the internal lifecycle.
    ///
    /// `Blocked` maps to `LifecycleState::Blocked`, which the wave scheduler
    /// promotes to `Failed` only once the session's timeout elapses — this
    /// function does not have access to elapsed time, so it never returns
    /// `Failed` directly.
    pub fn to_lifecycle(self) -> LifecycleState {
        match self {
            BackendStatus::Working
            | BackendStatus::Dispatched
            | BackendStatus::SuspendRequested
            | BackendStatus::ResumeRequested
            | BackendStatus::Resumed => LifecycleState::Working,
            BackendStatus::Blocked => LifecycleState::Blocked,
            BackendStatus::Expired => LifecycleState::Timeout,
            BackendStatus::Finished => LifecycleState::Success,
        }
    }
}

/// Where a session's work was actually performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Mock,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if matches!(self, DataSource::Live) { "live" } else { "mock" })
    }
}

/// Run-level data source mode: `hybrid` picks `live` vs `mock` per session
/// at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Live,
    Mock,
    Hybrid,
}

/// Run-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Paused,
    Interrupted,
}

/// Human-in-the-loop review status on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}
