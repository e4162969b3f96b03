// SPDX-License-Identifier: MIT

//! Session manager (C5): picks a data source per session, memoizes session
//! creation through the idempotency ledger, and interprets backend status
//! into the internal lifecycle.

use crate::error::SchedulerError;
use rf_agent::{
    CreateSessionRequest, HardenedClient, RemoteAgentBackend, SessionSnapshot, SimulatedAgentBackend,
};
use rf_core::{Clock, DataSource, Finding, RunMode};
use rf_storage::IdempotencyLedger;
use tokio_util::sync::CancellationToken;

/// The two backend clients a run may dispatch through. `hybrid` mode picks
/// between them per session; `live`/`mock` always use one.
pub struct BackendClients<C: Clock> {
    pub live: Option<HardenedClient<RemoteAgentBackend, C>>,
    pub simulated: HardenedClient<SimulatedAgentBackend<C>, C>,
}

impl<C: Clock> BackendClients<C> {
    /// Crate-visible so the wave scheduler can drive dispatch/poll
    /// concurrently across many sessions without going through the
    /// single-session `dispatch`/`poll` convenience functions below, which
    /// serialize on `&mut IdempotencyLedger`.
    pub(crate) async fn create_session(
        &self,
        data_source: DataSource,
        request: CreateSessionRequest,
        cancellation: &CancellationToken,
    ) -> Result<rf_agent::CreateSessionResponse, SchedulerError> {
        match data_source {
            DataSource::Live => {
                let live = self.live.as_ref().ok_or(SchedulerError::LiveBackendNotConfigured)?;
                Ok(live.create_session(request, cancellation).await?)
            }
            DataSource::Mock => Ok(self.simulated.create_session(request, cancellation).await?),
        }
    }

    pub(crate) async fn get_session(
        &self,
        data_source: DataSource,
        session_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<SessionSnapshot, SchedulerError> {
        match data_source {
            DataSource::Live => {
                let live = self.live.as_ref().ok_or(SchedulerError::LiveBackendNotConfigured)?;
                Ok(live.get_session(session_id, cancellation).await?)
            }
            DataSource::Mock => Ok(self.simulated.get_session(session_id, cancellation).await?),
        }
    }

    pub(crate) async fn terminate_session(
        &self,
        data_source: DataSource,
        session_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<(), SchedulerError> {
        match data_source {
            DataSource::Live => {
                let live = self.live.as_ref().ok_or(SchedulerError::LiveBackendNotConfigured)?;
                Ok(live.terminate_session(session_id, cancellation).await?)
            }
            DataSource::Mock => Ok(self.simulated.terminate_session(session_id, cancellation).await?),
        }
    }
}

/// Choose `live` vs `mock` for one finding under the run's `mode`, per
/// §4.5: `live`/`mock` are unconditional, `hybrid` matches the finding's
/// service name against the connected-repo list by substring.
pub fn select_data_source(mode: RunMode, finding: &Finding, connected_repos: &[String]) -> DataSource {
    match mode {
        RunMode::Live => DataSource::Live,
        RunMode::Mock => DataSource::Mock,
        RunMode::Hybrid => {
            let matches = connected_repos
                .iter()
                .any(|repo| finding.service_name.contains(repo.as_str()));
            if matches {
                DataSource::Live
            } else {
                DataSource::Mock
            }
        }
    }
}

/// Result of a dispatch attempt, so the caller can distinguish an
/// idempotency-ledger hit from a freshly created session for event
/// emission.
pub enum DispatchOutcome {
    Created { session_id: String, url: String },
    LedgerHit { session_id: String },
}

/// Create or reuse a session for `ledger_key`. On a ledger hit the backend
/// is never called; on a miss, `create_session` is invoked and the result
/// is upserted into the ledger before being returned.
#[allow(clippy::too_many_arguments)]
pub async fn dispatch<C: Clock>(
    clients: &BackendClients<C>,
    ledger: &mut IdempotencyLedger,
    ledger_key: &str,
    data_source: DataSource,
    prompt: String,
    playbook_id: Option<String>,
    tags: Vec<String>,
    max_acu_limit: u32,
    cancellation: &CancellationToken,
) -> Result<DispatchOutcome, SchedulerError> {
    if let Some(session_id) = ledger.get(ledger_key) {
        return Ok(DispatchOutcome::LedgerHit {
            session_id: session_id.to_string(),
        });
    }

    let request = CreateSessionRequest {
        prompt,
        playbook_id,
        tags,
        structured_output_schema: None,
        max_acu_limit,
        idempotent: true,
    };
    let response = clients.create_session(data_source, request, cancellation).await?;
    ledger.upsert(ledger_key.to_string(), response.session_id.clone())?;

    Ok(DispatchOutcome::Created {
        session_id: response.session_id,
        url: response.url,
    })
}

/// Poll a session's current status from its backend.
pub async fn poll<C: Clock>(
    clients: &BackendClients<C>,
    data_source: DataSource,
    session_id: &str,
    cancellation: &CancellationToken,
) -> Result<SessionSnapshot, SchedulerError> {
    clients.get_session(data_source, session_id, cancellation).await
}

/// Best-effort remote termination; failures are swallowed by the caller
/// per the timeout-handling propagation policy (§7).
pub async fn terminate<C: Clock>(
    clients: &BackendClients<C>,
    data_source: DataSource,
    session_id: &str,
    cancellation: &CancellationToken,
) -> Result<(), SchedulerError> {
    clients.terminate_session(data_source, session_id, cancellation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{Category, FindingId, Severity};

    fn finding(service: &str) -> Finding {
        Finding {
            id: FindingId::new("f-1"),
            scanner: "semgrep".into(),
            category: Category::Xss,
            severity: Severity::High,
            title: "t".into(),
            description: "d".into(),
            service_name: service.into(),
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

    #[test]
    fn live_mode_is_always_live() {
        assert_eq!(
            select_data_source(RunMode::Live, &finding("svc"), &[]),
            DataSource::Live
        );
    }

    #[test]
    fn mock_mode_is_always_mock() {
        assert_eq!(
            select_data_source(RunMode::Mock, &finding("svc"), &["svc".to_string()]),
            DataSource::Mock
        );
    }

    #[test]
    fn hybrid_mode_matches_connected_repo_by_substring() {
        let connected = vec!["payments".to_string()];
        assert_eq!(
            select_data_source(RunMode::Hybrid, &finding("payments-api"), &connected),
            DataSource::Live
        );
        assert_eq!(
            select_data_source(RunMode::Hybrid, &finding("inventory"), &connected),
            DataSource::Mock
        );
    }
}
