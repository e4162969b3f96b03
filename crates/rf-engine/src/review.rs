// SPDX-License-Identifier: MIT

//! Human review mutation path (C11): approve or reject a remediation
//! session out of band from the scheduler. Out-of-process-safe — this is
//! called from both `rf-cli` (operator on the box running the run) and
//! `rf-http` (a request handler in a separate process from the supervisor
//! that dispatched the run), so it takes the C1 lock on the run's
//! `state.json` itself rather than assuming it already holds one.

use chrono::{DateTime, Utc};
use rf_core::{Clock, EventKind, ReviewStatus, TimelineEvent};
use rf_storage::StateStore;

use crate::error::ReviewError;

/// The two review outcomes an operator can record. There is no "pending"
/// variant here — pending is the absence of a review, not a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approved,
    Rejected,
}

impl std::str::FromStr for ReviewAction {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ReviewAction::Approved),
            "rejected" => Ok(ReviewAction::Rejected),
            other => Err(ReviewError::InvalidAction(other.to_string())),
        }
    }
}

/// A review request as received from a caller. `reviewer_id` must come
/// from the caller's authenticated identity, never from a request body
/// field the caller could forge.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub run_id: String,
    pub session_id: String,
    pub action: String,
    pub reason: Option<String>,
    pub reviewer_id: String,
}

/// Reject run ids containing anything but ASCII alphanumerics and `-`,
/// which rules out path traversal (`..`, `/`) before the id is ever used
/// to build a filesystem path.
fn validate_run_id(run_id: &str) -> Result<(), ReviewError> {
    let valid = !run_id.is_empty() && run_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ReviewError::InvalidRunId(run_id.to_string()))
    }
}

/// Apply a review decision to the named session within the named run.
///
/// Validation (run id charset, action spelling) happens before anything
/// touches disk. Only after both pass is the C1 lock on the run's
/// `state.json` acquired, the file read, the session located by matching
/// either its backend session id or its finding id against
/// `request.session_id`, its review fields set, a `review_approved` or
/// `review_rejected` timeline event appended, and the file written back
/// while the lock is still held. An unknown session id returns
/// `SessionNotFound` without any mutation.
pub fn apply<C: Clock>(
    store: &StateStore<C>,
    request: ReviewRequest,
    now: DateTime<Utc>,
) -> Result<rf_core::RemediationSession, ReviewError> {
    validate_run_id(&request.run_id)?;
    let action: ReviewAction = request.action.parse()?;

    let guard = store.lock_run_state(&request.run_id, "review")?;
    let mut run = store
        .read_run_state(&request.run_id)?
        .ok_or_else(|| ReviewError::SessionNotFound(request.session_id.clone()))?;

    let index = run
        .sessions
        .iter()
        .position(|session| {
            session
                .backend_session_id
                .as_ref()
                .is_some_and(|id| id == request.session_id.as_str())
                || session.finding.id == request.session_id.as_str()
        })
        .ok_or_else(|| ReviewError::SessionNotFound(request.session_id.clone()))?;

    let (status, kind) = match action {
        ReviewAction::Approved => (ReviewStatus::Approved, EventKind::ReviewApproved),
        ReviewAction::Rejected => (ReviewStatus::Rejected, EventKind::ReviewRejected),
    };

    let finding_id = run.sessions[index].finding.id.clone();
    {
        let session = &mut run.sessions[index];
        session.review_status = Some(status);
        session.reviewer_id = Some(request.reviewer_id.clone());
        session.reviewed_at = Some(now);
        session.review_reason = request.reason.clone();
        session.bump_version();
    }

    let mut event = TimelineEvent::new(run.id.clone(), kind, now)
        .with_finding(finding_id)
        .with_message(format!("reviewed by {}", request.reviewer_id));
    if let Some(reason) = request.reason.as_ref() {
        event = event.with_detail(serde_json::json!({ "reason": reason }));
    }
    run.push_event(event);

    store.write_run_state_locked(&run)?;
    drop(guard);

    Ok(run.sessions[index].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{
        BatchRun, Category, FakeClock, Finding, FindingId, RemediationSession, RunId, RunMode, Severity,
    };
    use tempfile::tempdir;

    fn finding() -> Finding {
        Finding {
            id: FindingId::new("f-1"),
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

    fn store() -> (tempfile::TempDir, StateStore<FakeClock>) {
        let dir = tempdir().expect("tempdir");
        let clock = FakeClock::new(Utc::now());
        let store = StateStore::new(dir.path(), clock);
        (dir, store)
    }

    fn seeded_run(store: &StateStore<FakeClock>, run_id: &str) {
        let now = Utc::now();
        let mut run = BatchRun::new(RunId::new(run_id), RunMode::Mock, 1, 1, 1, now);
        let session = RemediationSession::new(finding(), "xss".to_string(), 1, 1, rf_core::DataSource::Mock, now);
        run.sessions.push(session);
        store.write_run_state(&run).expect("seed write");
    }

    #[test]
    fn rejects_bad_run_id_before_touching_disk() {
        let (_dir, store) = store();
        let err = apply(
            &store,
            ReviewRequest {
                run_id: "../etc".to_string(),
                session_id: "f-1".to_string(),
                action: "approved".to_string(),
                reason: None,
                reviewer_id: "alice".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidRunId(_)));
    }

    #[test]
    fn rejects_unknown_action() {
        let (_dir, store) = store();
        seeded_run(&store, "run-1");
        let err = apply(
            &store,
            ReviewRequest {
                run_id: "run-1".to_string(),
                session_id: "f-1".to_string(),
                action: "maybe".to_string(),
                reason: None,
                reviewer_id: "alice".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidAction(_)));
    }

    #[test]
    fn unknown_session_id_reports_not_found_without_mutation() {
        let (_dir, store) = store();
        seeded_run(&store, "run-1");
        let err = apply(
            &store,
            ReviewRequest {
                run_id: "run-1".to_string(),
                session_id: "no-such-session".to_string(),
                action: "approved".to_string(),
                reason: None,
                reviewer_id: "alice".to_string(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::SessionNotFound(_)));

        let run = store.read_run_state("run-1").expect("read").expect("present");
        assert_eq!(run.sessions[0].version, 0);
    }

    #[test]
    fn approval_sets_review_fields_and_appends_event() {
        let (_dir, store) = store();
        seeded_run(&store, "run-1");
        let now = Utc::now();
        let updated = apply(
            &store,
            ReviewRequest {
                run_id: "run-1".to_string(),
                session_id: "f-1".to_string(),
                action: "approved".to_string(),
                reason: Some("looks correct".to_string()),
                reviewer_id: "alice".to_string(),
            },
            now,
        )
        .expect("apply should succeed");

        assert_eq!(updated.review_status, Some(ReviewStatus::Approved));
        assert_eq!(updated.reviewer_id, Some("alice".to_string()));
        assert_eq!(updated.review_reason, Some("looks correct".to_string()));
        assert_eq!(updated.version, 1);

        let run = store.read_run_state("run-1").expect("read").expect("present");
        assert!(run
            .timeline
            .iter()
            .any(|event| matches!(event.kind, EventKind::ReviewApproved)));
    }

    #[test]
    fn matches_by_backend_session_id_when_set() {
        let (_dir, store) = store();
        let now = Utc::now();
        let mut run = BatchRun::new(RunId::new("run-2"), RunMode::Mock, 1, 1, 1, now);
        let mut session = RemediationSession::new(finding(), "xss".to_string(), 1, 1, rf_core::DataSource::Mock, now);
        session.backend_session_id = Some(rf_core::SessionId::new("backend-abc"));
        run.sessions.push(session);
        store.write_run_state(&run).expect("seed write");

        let updated = apply(
            &store,
            ReviewRequest {
                run_id: "run-2".to_string(),
                session_id: "backend-abc".to_string(),
                action: "rejected".to_string(),
                reason: None,
                reviewer_id: "bob".to_string(),
            },
            Utc::now(),
        )
        .expect("apply should succeed");
        assert_eq!(updated.review_status, Some(ReviewStatus::Rejected));
    }
}
