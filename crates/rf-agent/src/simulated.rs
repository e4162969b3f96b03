// SPDX-License-Identifier: MIT

//! Deterministic simulated backend used for `mock`-mode runs and tests.
//! Given a creation timestamp, computes a stage progression purely from
//! elapsed wall time — no background task, no real network I/O.

use crate::backend::{
    AgentBackend, AgentBackendError, CreateSessionRequest, CreateSessionResponse,
    PlaybookSummary, SessionSnapshot,
};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng};
use parking_lot::Mutex;
use rf_core::{BackendStatus, Clock, Confidence, SessionReportStatus, StructuredOutput};
use std::collections::HashMap;
use std::time::Duration;

const STAGE_DURATION: Duration = Duration::from_secs(20);
const FAILURE_RATE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Analyzing,
    Fixing,
    Testing,
    CreatingPr,
    Finished,
    /// A designated-failure session stalls here permanently once it reaches
    /// the testing stage instead of advancing to `CreatingPr`.
    Blocked,
}

struct SimSession {
    finding_id: String,
    created_at_ms: i64,
    is_failure: bool,
}

/// Backend whose sessions progress deterministically as wall time advances,
/// for `mock` and `hybrid` mode runs. ~15% of sessions are designated
/// failures at creation time (seeded, so a given seed+finding always
/// produces the same outcome).
pub struct SimulatedAgentBackend<C: Clock> {
    clock: C,
    seed: u64,
    sessions: Mutex<HashMap<String, SimSession>>,
}

impl<C: Clock> SimulatedAgentBackend<C> {
    pub fn new(clock: C, seed: u64) -> Self {
        Self {
            clock,
            seed,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn stage_for(&self, session: &SimSession) -> Stage {
        let elapsed_ms = (self.clock.epoch_ms() as i64 - session.created_at_ms).max(0);
        let stage_index = (elapsed_ms as u64 / STAGE_DURATION.as_millis() as u64).min(4);
        match stage_index {
            0 => Stage::Analyzing,
            1 => Stage::Fixing,
            2 => {
                if session.is_failure {
                    Stage::Blocked
                } else {
                    Stage::Testing
                }
            }
            3 => {
                if session.is_failure {
                    Stage::Blocked
                } else {
                    Stage::CreatingPr
                }
            }
            _ => {
                if session.is_failure {
                    Stage::Blocked
                } else {
                    Stage::Finished
                }
            }
        }
    }

    /// Deterministic per-session RNG: seeded from the backend seed mixed
    /// with the session's finding id, so replaying the same run with the
    /// same seed reproduces the same designated failures.
    fn is_designated_failure(&self, finding_id: &str) -> bool {
        let mut hasher_seed = self.seed;
        for byte in finding_id.as_bytes() {
            hasher_seed = hasher_seed.wrapping_mul(31).wrapping_add(*byte as u64);
        }
        let mut rng = StdRng::seed_from_u64(hasher_seed);
        rng.random_bool(FAILURE_RATE)
    }
}

#[async_trait]
impl<C: Clock> AgentBackend for SimulatedAgentBackend<C> {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, AgentBackendError> {
        let finding_id = request
            .tags
            .first()
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let session_id = format!("sim-{}-{}", finding_id, self.clock.epoch_ms());
        let is_failure = self.is_designated_failure(&finding_id);

        self.sessions.lock().insert(
            session_id.clone(),
            SimSession {
                finding_id,
                created_at_ms: self.clock.epoch_ms() as i64,
                is_failure,
            },
        );

        Ok(CreateSessionResponse {
            session_id: session_id.clone(),
            url: format!("https://simulated.local/sessions/{session_id}"),
            is_new: true,
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, AgentBackendError> {
        let sessions = self.sessions.lock();
        let session = sessions
            .get(session_id)
            .ok_or_else(|| AgentBackendError::NotFound(session_id.to_string()))?;
        let stage = self.stage_for(session);

        let (status, report_status, progress_pct, pr_url) = match stage {
            Stage::Analyzing => (BackendStatus::Working, SessionReportStatus::Analyzing, 10, None),
            Stage::Fixing => (BackendStatus::Working, SessionReportStatus::Fixing, 40, None),
            Stage::Testing => (BackendStatus::Working, SessionReportStatus::Testing, 70, None),
            Stage::CreatingPr => (
                BackendStatus::Working,
                SessionReportStatus::CreatingPr,
                90,
                None,
            ),
            Stage::Finished => (
                BackendStatus::Finished,
                SessionReportStatus::Completed,
                100,
                Some(format!("https://simulated.local/prs/{session_id}")),
            ),
            Stage::Blocked => (BackendStatus::Blocked, SessionReportStatus::Testing, 70, None),
        };

        let structured_output = StructuredOutput {
            finding_id: session.finding_id.clone(),
            status: report_status,
            progress_pct,
            current_step: format!("{report_status:?}"),
            fix_approach: None,
            files_modified: Vec::new(),
            tests_passed: matches!(stage, Stage::Finished).then_some(true),
            tests_added: false,
            pr_url: pr_url.clone(),
            error_message: matches!(stage, Stage::Blocked)
                .then(|| "simulated session stalled".to_string()),
            confidence: Confidence::Medium,
            extra: HashMap::new(),
        };

        Ok(SessionSnapshot {
            status,
            structured_output: Some(structured_output),
            pull_request: pr_url,
        })
    }

    async fn list_sessions(
        &self,
        _tags: &[String],
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<String>, AgentBackendError> {
        Ok(self.sessions.lock().keys().cloned().collect())
    }

    async fn send_message(&self, _session_id: &str, _text: &str) -> Result<(), AgentBackendError> {
        Ok(())
    }

    async fn terminate_session(&self, session_id: &str) -> Result<(), AgentBackendError> {
        self.sessions.lock().remove(session_id);
        Ok(())
    }

    async fn create_playbook(&self, title: &str, _body: &str) -> Result<String, AgentBackendError> {
        Ok(format!("sim-playbook-{title}"))
    }

    async fn list_playbooks(&self) -> Result<Vec<PlaybookSummary>, AgentBackendError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::FakeClock;

    fn backend_at(epoch_ms: i64, seed: u64) -> SimulatedAgentBackend<FakeClock> {
        let clock = FakeClock::new(
            chrono::DateTime::from_timestamp_millis(epoch_ms).expect("valid timestamp"),
        );
        SimulatedAgentBackend::new(clock, seed)
    }

    #[tokio::test]
    async fn stage_advances_as_clock_advances() {
        let backend = backend_at(0, 1);
        let response = backend
            .create_session(CreateSessionRequest {
                prompt: "fix it".to_string(),
                playbook_id: None,
                tags: vec!["f-success".to_string()],
                structured_output_schema: None,
                max_acu_limit: 5,
                idempotent: true,
            })
            .await
            .expect("create_session");

        let snapshot = backend.get_session(&response.session_id).await.expect("get_session");
        assert_eq!(snapshot.status, BackendStatus::Working);

        backend.clock.advance(chrono::Duration::seconds(100));
        let snapshot = backend.get_session(&response.session_id).await.expect("get_session");
        assert_eq!(snapshot.status, BackendStatus::Finished);
        assert!(snapshot.pull_request.is_some());
    }

    #[tokio::test]
    async fn designated_failures_are_deterministic_for_a_seed() {
        let backend_a = backend_at(0, 42);
        let backend_b = backend_at(0, 42);
        assert_eq!(
            backend_a.is_designated_failure("f-1"),
            backend_b.is_designated_failure("f-1")
        );
    }

    #[tokio::test]
    async fn failure_rate_is_roughly_fifteen_percent_over_many_findings() {
        let backend = backend_at(0, 7);
        let failures = (0..2000)
            .filter(|i| backend.is_designated_failure(&format!("f-{i}")))
            .count();
        let rate = failures as f64 / 2000.0;
        assert!((0.10..0.20).contains(&rate), "observed rate {rate}");
    }

    #[tokio::test]
    async fn unknown_session_id_is_not_found() {
        let backend = backend_at(0, 1);
        let err = backend.get_session("does-not-exist").await.unwrap_err();
        assert!(matches!(err, AgentBackendError::NotFound(_)));
    }
}
