// SPDX-License-Identifier: MIT

//! BatchRun: the top-level aggregate for one remediation fleet run.

use crate::id::RunId;
use crate::lifecycle::{LifecycleState, RunMode, RunStatus};
use crate::session::RemediationSession;
use crate::timeline::TimelineEvent;
use crate::wave::Wave;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level state for one orchestration run: its waves, every session ever
/// dispatched (across retries), rolling counts, and the append-only
/// timeline. Counts are recomputed from `sessions` on every mutation
/// (`recount`) rather than incremented independently, so they can never
/// drift from the sessions that back them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: RunId,
    pub status: RunStatus,
    pub mode: RunMode,
    pub total_findings: u32,
    pub completed: u32,
    pub successful: u32,
    pub failed: u32,
    pub prs_created: u32,
    pub current_wave: u32,
    pub wave_size: u32,
    pub max_concurrency: u32,
    pub waves: Vec<Wave>,
    pub sessions: Vec<RemediationSession>,
    pub timeline: Vec<TimelineEvent>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_csv: Option<String>,
}

impl BatchRun {
    pub fn new(
        id: RunId,
        mode: RunMode,
        total_findings: u32,
        wave_size: u32,
        max_concurrency: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status: RunStatus::Pending,
            mode,
            total_findings,
            completed: 0,
            successful: 0,
            failed: 0,
            prs_created: 0,
            current_wave: 0,
            wave_size,
            max_concurrency,
            waves: Vec::new(),
            sessions: Vec::new(),
            timeline: Vec::new(),
            started_at,
            completed_at: None,
            source_csv: None,
        }
    }

    /// Recompute `completed`/`successful`/`failed`/`prs_created` from
    /// `sessions` — the ground truth. Never increment these counters
    /// independently of the session list.
    pub fn recount(&mut self) {
        self.completed = self.sessions.iter().filter(|s| s.is_terminal()).count() as u32;
        self.successful = self
            .sessions
            .iter()
            .filter(|s| s.state == LifecycleState::Success)
            .count() as u32;
        self.failed = self.completed - self.successful;
        self.prs_created = self.sessions.iter().filter(|s| s.pr_url.is_some()).count() as u32;
    }

    pub fn push_event(&mut self, event: TimelineEvent) {
        self.timeline.push(event);
    }

    pub fn remaining(&self) -> u32 {
        self.total_findings.saturating_sub(self.completed)
    }

    pub fn is_exhausted(&self) -> bool {
        self.completed >= self.total_findings
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(at);
    }

    pub fn mark_interrupted(&mut self) {
        if self.status != RunStatus::Completed {
            self.status = RunStatus::Interrupted;
        }
    }

    /// A gated wave pauses the run; resuming it is out of scope here — the
    /// operator starts a new run. Never reopens a run that already reached
    /// `Completed`.
    pub fn mark_paused(&mut self) {
        if self.status != RunStatus::Completed {
            self.status = RunStatus::Paused;
        }
    }
}

/// Lightweight row used by the run index and list views, kept separate from
/// `BatchRun` so the index file stays cheap to read even with many runs on
/// disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: RunId,
    pub status: RunStatus,
    pub mode: RunMode,
    pub total_findings: u32,
    pub completed: u32,
    pub failed: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_csv: Option<String>,
}

impl From<&BatchRun> for RunSummary {
    fn from(run: &BatchRun) -> Self {
        Self {
            id: run.id.clone(),
            status: run.status,
            mode: run.mode,
            total_findings: run.total_findings,
            completed: run.completed,
            failed: run.failed,
            started_at: run.started_at,
            completed_at: run.completed_at,
            source_csv: run.source_csv.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Category, Finding, Severity};
    use crate::id::FindingId;
    use crate::lifecycle::DataSource;

    fn finding(id: &str) -> Finding {
        Finding {
            id: FindingId::new(id),
            scanner: "semgrep".into(),
            category: Category::Xss,
            severity: Severity::High,
            title: "t".into(),
            description: "d".into(),
            service_name: "svc".into(),
            repo_url: "https://repo".into(),
            file_path: "a.py".into(),
            line_number: None,
            cwe_id: None,
            dependency_name: None,
            current_version: None,
            fixed_version: None,
            language: None,
            priority_score: 10,
        }
    }

    fn session(id: &str, state: LifecycleState) -> RemediationSession {
        let mut s = RemediationSession::new(finding(id), "pb".into(), 1, 1, DataSource::Mock, Utc::now());
        s.state = state;
        s
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let mut run = BatchRun::new(RunId::new("run-1"), RunMode::Mock, 2, 2, 3, Utc::now());
        run.sessions.push(session("f-1", LifecycleState::Success));
        run.sessions.push(session("f-2", LifecycleState::Failed));
        run.recount();
        assert_eq!(run.remaining(), 0);
        assert!(run.is_exhausted());
    }

    #[test]
    fn recount_partitions_completed_into_successful_and_failed() {
        let mut run = BatchRun::new(RunId::new("run-1"), RunMode::Mock, 3, 3, 3, Utc::now());
        run.sessions.push(session("f-1", LifecycleState::Success));
        run.sessions.push(session("f-2", LifecycleState::Failed));
        run.sessions.push(session("f-3", LifecycleState::Working));
        run.recount();
        assert_eq!(run.completed, 2);
        assert_eq!(run.successful, 1);
        assert_eq!(run.failed, 1);
    }

    #[test]
    fn mark_completed_does_not_reopen_once_set() {
        let mut run = BatchRun::new(RunId::new("run-1"), RunMode::Mock, 1, 1, 1, Utc::now());
        run.mark_completed(Utc::now());
        run.mark_interrupted();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[test]
    fn mark_paused_does_not_reopen_a_completed_run() {
        let mut run = BatchRun::new(RunId::new("run-1"), RunMode::Mock, 1, 1, 1, Utc::now());
        run.mark_completed(Utc::now());
        run.mark_paused();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[test]
    fn mark_paused_sets_paused_status() {
        let mut run = BatchRun::new(RunId::new("run-1"), RunMode::Mock, 10, 5, 3, Utc::now());
        run.mark_paused();
        assert_eq!(run.status, RunStatus::Paused);
    }

    #[test]
    fn summary_mirrors_run_fields() {
        let run = BatchRun::new(RunId::new("run-1"), RunMode::Live, 10, 5, 4, Utc::now());
        let summary = RunSummary::from(&run);
        assert_eq!(summary.id, run.id);
        assert_eq!(summary.total_findings, 10);
    }
}
