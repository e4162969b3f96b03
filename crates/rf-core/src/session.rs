// SPDX-License-Identifier: MIT

//! RemediationSession: mutable state for one (finding, attempt) pair.

use crate::finding::Finding;
use crate::id::SessionId;
use crate::lifecycle::{DataSource, LifecycleState, ReviewStatus};
use crate::structured_output::StructuredOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One attempt by a remote agent to remediate one finding.
///
/// Created by the wave scheduler when a wave is built; mutated only by the
/// scheduler (status/ids) and the review path (review fields + version).
/// Never destroyed within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_session_id: Option<SessionId>,
    pub finding: Finding,
    pub playbook_id: String,
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<StructuredOutput>,
    pub wave_number: u32,
    /// Starts at 1; increases only via retry.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub data_source: DataSource,
    /// Monotonically non-decreasing across all mutations.
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_status: Option<ReviewStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
}

impl RemediationSession {
    pub fn new(
        finding: Finding,
        playbook_id: String,
        wave_number: u32,
        attempt: u32,
        data_source: DataSource,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            backend_session_id: None,
            finding,
            playbook_id,
            state: LifecycleState::Pending,
            backend_url: None,
            pr_url: None,
            structured_output: None,
            wave_number,
            attempt,
            created_at,
            completed_at: None,
            error_message: None,
            data_source,
            version: 0,
            review_status: None,
            reviewer_id: None,
            reviewed_at: None,
            review_reason: None,
        }
    }

    /// The idempotency ledger key for this (finding, attempt) pair.
    pub fn ledger_key(&self, run_id: &str) -> String {
        ledger_key(run_id, self.finding.id.as_str(), self.attempt)
    }

    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Transition to a new lifecycle state. Never rolls back from terminal
    /// to non-terminal — the caller is expected to have already checked
    /// `is_terminal()` before calling this for a poll update, but this is a
    /// last-resort guard against a stale update clobbering a terminal
    /// session.
    pub fn transition(&mut self, new_state: LifecycleState, now: DateTime<Utc>) {
        if self.state.is_terminal() && !new_state.is_terminal() {
            return;
        }
        self.state = new_state;
        if new_state.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.bump_version();
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Build the idempotency ledger key for a (run, finding, attempt) triple.
pub fn ledger_key(run_id: &str, finding_id: &str, attempt: u32) -> String {
    format!("{run_id}-{finding_id}-attempt-{attempt}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Category, Severity};

    fn finding() -> Finding {
        Finding {
            id: crate::id::FindingId::new("f-1"),
            scanner: "semgrep".into(),
            category: Category::SqlInjection,
            severity: Severity::High,
            title: "t".into(),
            description: "d".into(),
            service_name: "svc".into(),
            repo_url: "https://example/repo".into(),
            file_path: "a.py".into(),
            line_number: Some(10),
            cwe_id: None,
            dependency_name: None,
            current_version: None,
            fixed_version: None,
            language: None,
            priority_score: 55,
        }
    }

    #[test]
    fn version_is_monotonic() {
        let mut s = RemediationSession::new(
            finding(),
            "pb".into(),
            1,
            1,
            DataSource::Mock,
            Utc::now(),
        );
        assert_eq!(s.version, 0);
        s.transition(LifecycleState::Dispatched, Utc::now());
        assert_eq!(s.version, 1);
        s.transition(LifecycleState::Success, Utc::now());
        assert_eq!(s.version, 2);
    }

    #[test]
    fn terminal_state_never_rolls_back() {
        let mut s = RemediationSession::new(
            finding(),
            "pb".into(),
            1,
            1,
            DataSource::Mock,
            Utc::now(),
        );
        s.transition(LifecycleState::Success, Utc::now());
        let version_at_success = s.version;
        s.transition(LifecycleState::Working, Utc::now());
        assert_eq!(s.state, LifecycleState::Success);
        assert_eq!(s.version, version_at_success);
    }

    #[test]
    fn ledger_key_includes_attempt() {
        let s = RemediationSession::new(
            finding(),
            "pb".into(),
            1,
            2,
            DataSource::Mock,
            Utc::now(),
        );
        assert_eq!(s.ledger_key("run-1"), "run-1-f-1-attempt-2");
    }
}
