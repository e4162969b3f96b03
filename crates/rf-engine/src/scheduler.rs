// SPDX-License-Identifier: MIT

//! Wave scheduler (C6): the design center. Dispatches a wave's sessions
//! (ledger-aware, bounded concurrency), polls them to a terminal lifecycle
//! state, gates the run on the wave's success rate, and retries eligible
//! failures in place before the wave is considered closed.
//!
//! Dispatch and poll both run their network calls through
//! `futures::stream::FuturesUnordered` bounded by a `tokio::sync::Semaphore`
//! rather than `tokio::spawn`, since the futures borrow `&BackendClients`
//! and `&CancellationToken` instead of owning `'static` data. The
//! idempotency ledger is never shared across concurrent futures: lookups
//! happen before the concurrent phase, upserts happen after, as results are
//! drained.

use crate::memory::{self, RetrievedMemory};
use crate::prompt::build_prompt;
use crate::session_manager::{self, BackendClients};
use futures::stream::{FuturesUnordered, StreamExt};
use rf_agent::CreateSessionRequest;
use rf_core::{
    Clock, EventKind, Finding, GateReason, LifecycleState, MemoryGraph, RemediationSession, RunId, RunMode,
    SessionId, TimelineEvent, Wave,
};
use rf_storage::IdempotencyLedger;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Knobs the scheduler needs that don't belong to any single session.
#[derive(Debug, Clone)]
pub struct SchedulerParams {
    pub run_id: String,
    pub mode: RunMode,
    pub connected_repos: Vec<String>,
    pub max_parallelism: usize,
    pub max_acu_per_session: u32,
    pub poll_interval: Duration,
    pub session_timeout: Duration,
    pub min_success_rate: f64,
    pub max_retries: u32,
}

/// What running one wave to its conclusion produced. `sessions` is mutated
/// in place through the caller's own `&mut Vec`, so only the events and the
/// gate outcome need to be reported back.
pub struct WaveOutcome {
    pub events: Vec<TimelineEvent>,
    pub gated: bool,
}

/// Run one wave to completion: dispatch, poll to terminal, gate, retry.
///
/// `sessions` are this wave's assigned sessions, already created by the
/// supervisor at `PENDING`/attempt 1 when the full run was built — a gated
/// run must be able to show later waves' sessions sitting untouched at
/// `PENDING`, so wave construction and session creation happen once, up
/// front, not lazily per wave.
#[allow(clippy::too_many_arguments)]
pub async fn run_wave<C: Clock>(
    wave: &mut Wave,
    sessions: &mut Vec<RemediationSession>,
    params: &SchedulerParams,
    clients: &BackendClients<C>,
    ledger: &mut IdempotencyLedger,
    memory_graph: &MemoryGraph,
    narratives: &[(String, String)],
    clock: &C,
    cancellation: &CancellationToken,
) -> WaveOutcome {
    let run_id = RunId::new(params.run_id.clone());
    let mut events = vec![
        TimelineEvent::new(run_id.clone(), EventKind::WaveStarted, clock.now()).with_wave(wave.number),
    ];

    dispatch_all(sessions, params, clients, ledger, memory_graph, narratives, clock, cancellation, &mut events)
        .await;
    poll_all_to_terminal(sessions, params, clients, clock, cancellation, &mut events).await;

    let success_rate = success_rate_of(sessions);
    if success_rate < params.min_success_rate {
        wave.close(clock.now(), GateReason::MinSuccessRateNotMet);
        events.push(
            TimelineEvent::new(run_id.clone(), EventKind::WaveGated, clock.now())
                .with_wave(wave.number)
                .with_message(format!(
                    "success rate {success_rate:.2} below minimum {:.2}",
                    params.min_success_rate
                )),
        );
        return WaveOutcome { events, gated: true };
    }

    retry_failures(sessions, params, clients, ledger, memory_graph, narratives, clock, cancellation, &mut events)
        .await;

    wave.close(clock.now(), GateReason::Exhausted);
    events.push(TimelineEvent::new(run_id, EventKind::WaveCompleted, clock.now()).with_wave(wave.number));

    WaveOutcome { events, gated: false }
}

fn success_rate_of(sessions: &[RemediationSession]) -> f64 {
    if sessions.is_empty() {
        return 1.0;
    }
    let successful = sessions.iter().filter(|s| s.state == LifecycleState::Success).count();
    successful as f64 / sessions.len() as f64
}

enum DispatchResolution {
    /// A prior (possibly interrupted) run already created this session.
    Resumed { session_id: String },
    /// A fresh `create_session` call, concurrent with other misses.
    Created { session_id: String, url: String },
    Failed { message: String },
}

/// Dispatch every session. Ledger lookups are sequential; only the
/// network calls for ledger misses run concurrently.
#[allow(clippy::too_many_arguments)]
async fn dispatch_all<C: Clock>(
    sessions: &mut [RemediationSession],
    params: &SchedulerParams,
    clients: &BackendClients<C>,
    ledger: &mut IdempotencyLedger,
    memory_graph: &MemoryGraph,
    narratives: &[(String, String)],
    clock: &C,
    cancellation: &CancellationToken,
    events: &mut Vec<TimelineEvent>,
) {
    let semaphore = Arc::new(Semaphore::new(params.max_parallelism.max(1)));
    let mut resolved: Vec<(usize, DispatchResolution)> = Vec::new();
    let mut pending = FuturesUnordered::new();

    for (index, session) in sessions.iter().enumerate() {
        let ledger_key = session.ledger_key(&params.run_id);
        if let Some(session_id) = ledger.get(&ledger_key) {
            resolved.push((index, DispatchResolution::Resumed { session_id: session_id.to_string() }));
            continue;
        }

        let memories: Vec<RetrievedMemory> = memory::retrieve(memory_graph, &session.finding, clock.now(), 3);
        let prompt = build_prompt(&session.finding, &memories, narratives);
        let request = CreateSessionRequest {
            prompt,
            playbook_id: Some(session.playbook_id.clone()),
            tags: vec![
                session.finding.id.to_string(),
                format!("wave-{}", session.wave_number),
                format!("attempt-{}", session.attempt),
            ],
            structured_output_schema: None,
            max_acu_limit: params.max_acu_per_session,
            idempotent: true,
        };
        let data_source = session.data_source;
        let permit = Arc::clone(&semaphore);

        pending.push(async move {
            let _permit = permit.acquire().await;
            match clients.create_session(data_source, request, cancellation).await {
                Ok(response) => (
                    index,
                    DispatchResolution::Created { session_id: response.session_id, url: response.url },
                ),
                Err(err) => (index, DispatchResolution::Failed { message: err.to_string() }),
            }
        });
    }

    while let Some((index, resolution)) = pending.next().await {
        resolved.push((index, resolution));
    }

    for (index, resolution) in resolved {
        let now = clock.now();
        let session = &mut sessions[index];
        match resolution {
            DispatchResolution::Resumed { session_id } => {
                session.backend_session_id = Some(SessionId::new(session_id));
                session.transition(LifecycleState::Dispatched, now);
                events.push(
                    TimelineEvent::new(RunId::new(params.run_id.clone()), EventKind::SessionStarted, now)
                        .with_finding(session.finding.id.clone())
                        .with_wave(session.wave_number)
                        .with_message("resumed from idempotency ledger"),
                );
            }
            DispatchResolution::Created { session_id, url } => {
                let ledger_key = session.ledger_key(&params.run_id);
                if let Err(err) = ledger.upsert(ledger_key, session_id.clone()) {
                    tracing::error!(session_id = %session_id, error = %err, "failed to persist idempotency ledger entry");
                }
                session.backend_session_id = Some(SessionId::new(session_id));
                session.backend_url = Some(url);
                session.transition(LifecycleState::Dispatched, now);
                events.push(
                    TimelineEvent::new(RunId::new(params.run_id.clone()), EventKind::SessionStarted, now)
                        .with_finding(session.finding.id.clone())
                        .with_wave(session.wave_number),
                );
            }
            DispatchResolution::Failed { message } => {
                session.error_message = Some(message.clone());
                session.transition(LifecycleState::Failed, now);
                events.push(
                    TimelineEvent::new(RunId::new(params.run_id.clone()), EventKind::SessionFailed, now)
                        .with_finding(session.finding.id.clone())
                        .with_wave(session.wave_number)
                        .with_message(message),
                );
            }
        }
    }
}

/// Poll every non-terminal session until all sessions in `sessions` reach a
/// terminal state, or cancellation is observed between poll rounds.
async fn poll_all_to_terminal<C: Clock>(
    sessions: &mut [RemediationSession],
    params: &SchedulerParams,
    clients: &BackendClients<C>,
    clock: &C,
    cancellation: &CancellationToken,
    events: &mut Vec<TimelineEvent>,
) {
    loop {
        apply_timeouts(sessions, params, clients, clock, cancellation, events).await;

        let outstanding: Vec<usize> = sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_terminal())
            .map(|(i, _)| i)
            .collect();
        if outstanding.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(params.max_parallelism.max(1)));
        let mut pending = FuturesUnordered::new();
        for index in outstanding {
            let session = &sessions[index];
            let Some(session_id) = session.backend_session_id.clone() else { continue };
            let data_source = session.data_source;
            let permit = Arc::clone(&semaphore);
            pending.push(async move {
                let _permit = permit.acquire().await;
                let result = clients.get_session(data_source, session_id.as_str(), cancellation).await;
                (index, result)
            });
        }

        while let Some((index, result)) = pending.next().await {
            let now = clock.now();
            match result {
                Ok(snapshot) => {
                    let session = &mut sessions[index];
                    if let Some(structured) = snapshot.structured_output {
                        session.structured_output = Some(structured);
                    }
                    if let Some(pr_url) = snapshot.pull_request {
                        session.pr_url = Some(pr_url);
                    }
                    let new_state = snapshot.status.to_lifecycle();
                    let was_terminal = session.is_terminal();
                    session.transition(new_state, now);
                    if !was_terminal && session.is_terminal() {
                        let kind = if session.state == LifecycleState::Success {
                            EventKind::SessionCompleted
                        } else {
                            EventKind::SessionFailed
                        };
                        events.push(
                            TimelineEvent::new(RunId::new(params.run_id.clone()), kind, now)
                                .with_finding(session.finding.id.clone())
                                .with_wave(session.wave_number),
                        );
                    } else if !session.is_terminal() {
                        events.push(
                            TimelineEvent::new(RunId::new(params.run_id.clone()), EventKind::SessionProgress, now)
                                .with_finding(session.finding.id.clone())
                                .with_wave(session.wave_number),
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "poll failed, will retry next round");
                }
            }
        }

        let still_outstanding = sessions.iter().any(|s| !s.is_terminal());
        if !still_outstanding {
            return;
        }

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => return,
            _ = tokio::time::sleep(params.poll_interval) => {}
        }
    }
}

/// Promote any session past its timeout deadline to `Timeout` and best-effort
/// terminate it remotely; termination failures are logged and swallowed per
/// §7 — a dead backend session must not block run completion.
async fn apply_timeouts<C: Clock>(
    sessions: &mut [RemediationSession],
    params: &SchedulerParams,
    clients: &BackendClients<C>,
    clock: &C,
    cancellation: &CancellationToken,
    events: &mut Vec<TimelineEvent>,
) {
    let now = clock.now();
    let mut timed_out_indices = Vec::new();
    for (index, session) in sessions.iter_mut().enumerate() {
        if session.is_terminal() {
            continue;
        }
        let elapsed = now.signed_duration_since(session.created_at);
        let timed_out = elapsed
            .to_std()
            .map(|elapsed| elapsed > params.session_timeout)
            .unwrap_or(false);
        if !timed_out {
            continue;
        }
        // A blocked session times out into Failed (§4.6); any other
        // non-terminal state (working, dispatched) times out into Timeout.
        let terminal_state = if session.state == LifecycleState::Blocked {
            LifecycleState::Failed
        } else {
            LifecycleState::Timeout
        };
        session.error_message = Some("session exceeded its configured timeout".to_string());
        session.transition(terminal_state, now);
        events.push(
            TimelineEvent::new(RunId::new(params.run_id.clone()), EventKind::SessionFailed, now)
                .with_finding(session.finding.id.clone())
                .with_wave(session.wave_number)
                .with_message("timed out"),
        );
        timed_out_indices.push(index);
    }

    for index in timed_out_indices {
        let session = &sessions[index];
        let Some(session_id) = session.backend_session_id.clone() else { continue };
        if let Err(err) = clients.terminate_session(session.data_source, session_id.as_str(), cancellation).await {
            tracing::warn!(session_id = %session_id, error = %err, "best-effort termination of timed-out session failed");
        }
    }
}

/// Retry every most-recent-attempt session that ended `Failed` (not
/// `Timeout`) and hasn't exhausted `max_retries`, appending the new attempt
/// to `sessions` rather than replacing the failed one, per the run-level
/// invariant that a wave's session list includes its retries.
#[allow(clippy::too_many_arguments)]
async fn retry_failures<C: Clock>(
    sessions: &mut Vec<RemediationSession>,
    params: &SchedulerParams,
    clients: &BackendClients<C>,
    ledger: &mut IdempotencyLedger,
    memory_graph: &MemoryGraph,
    narratives: &[(String, String)],
    clock: &C,
    cancellation: &CancellationToken,
    events: &mut Vec<TimelineEvent>,
) {
    loop {
        let retryable = latest_retryable_indices(sessions, params.max_retries);
        if retryable.is_empty() {
            return;
        }

        let mut new_attempts = Vec::with_capacity(retryable.len());
        for index in retryable {
            let old = &sessions[index];
            let next_attempt = old.attempt + 1;
            let data_source = session_manager::select_data_source(params.mode, &old.finding, &params.connected_repos);
            new_attempts.push(RemediationSession::new(
                old.finding.clone(),
                old.playbook_id.clone(),
                old.wave_number,
                next_attempt,
                data_source,
                clock.now(),
            ));
            events.push(
                TimelineEvent::new(RunId::new(params.run_id.clone()), EventKind::SessionRetry, clock.now())
                    .with_finding(old.finding.id.clone())
                    .with_wave(old.wave_number)
                    .with_message(format!("attempt {next_attempt}")),
            );
        }

        dispatch_all(&mut new_attempts, params, clients, ledger, memory_graph, narratives, clock, cancellation, events)
            .await;
        poll_all_to_terminal(&mut new_attempts, params, clients, clock, cancellation, events).await;
        sessions.extend(new_attempts);
    }
}

/// Indices of sessions that are each finding's most recent attempt, ended
/// `Failed`, and still under the retry budget.
fn latest_retryable_indices(sessions: &[RemediationSession], max_retries: u32) -> Vec<usize> {
    let mut latest: HashMap<&str, usize> = HashMap::new();
    for (index, session) in sessions.iter().enumerate() {
        let key = session.finding.id.as_str();
        match latest.get(&key) {
            Some(&current) if sessions[current].attempt >= session.attempt => {}
            _ => {
                latest.insert(key, index);
            }
        }
    }
    latest
        .into_values()
        .filter(|&index| sessions[index].state == LifecycleState::Failed && sessions[index].attempt < max_retries)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::drive_fake_clock;
    use rf_agent::{CircuitBreakerConfig, HardenedClient, RetryConfig, SimulatedAgentBackend};
    use rf_core::{Category, FakeClock, FindingId, Severity};

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

    fn session_at(id: &str, attempt: u32, state: LifecycleState) -> RemediationSession {
        let mut s = RemediationSession::new(
            finding(id),
            "xss".into(),
            1,
            attempt,
            rf_core::DataSource::Mock,
            chrono::Utc::now(),
        );
        s.transition(state, chrono::Utc::now());
        s
    }

    #[test]
    fn success_rate_of_empty_wave_is_one() {
        assert_eq!(success_rate_of(&[]), 1.0);
    }

    #[test]
    fn success_rate_of_mixed_outcomes() {
        let sessions = vec![
            session_at("f-1", 1, LifecycleState::Success),
            session_at("f-2", 1, LifecycleState::Failed),
        ];
        assert_eq!(success_rate_of(&sessions), 0.5);
    }

    #[test]
    fn only_latest_failed_attempt_is_retryable() {
        let sessions = vec![
            session_at("f-1", 1, LifecycleState::Failed),
            session_at("f-1", 2, LifecycleState::Success),
            session_at("f-2", 1, LifecycleState::Failed),
        ];
        let retryable = latest_retryable_indices(&sessions, 2);
        assert_eq!(retryable, vec![2]);
    }

    #[test]
    fn exhausted_retry_budget_is_not_retryable() {
        let sessions = vec![session_at("f-1", 3, LifecycleState::Failed)];
        assert!(latest_retryable_indices(&sessions, 2).is_empty());
    }

    #[test]
    fn timed_out_sessions_are_not_retried() {
        let sessions = vec![session_at("f-1", 1, LifecycleState::Timeout)];
        assert!(latest_retryable_indices(&sessions, 2).is_empty());
    }

    fn simulated_clients(clock: FakeClock) -> BackendClients<FakeClock> {
        BackendClients {
            live: None,
            simulated: HardenedClient::new(
                SimulatedAgentBackend::new(clock.clone(), 42),
                clock,
                RetryConfig::default(),
                CircuitBreakerConfig::default(),
            ),
        }
    }

    /// A retried attempt must be dispatched under its own
    /// `{run_id}-{finding_id}-attempt-{n}` ledger key — not the failed
    /// attempt's key — so a process restart mid-retry resumes the right
    /// session instead of replaying the one that already failed.
    #[tokio::test(start_paused = true)]
    async fn retry_dispatches_under_a_fresh_ledger_key() {
        let clock = FakeClock::new(chrono::Utc::now());
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = IdempotencyLedger::load(dir.path().join("idempotency.json")).expect("load ledger");

        let mut sessions = vec![session_at("f-1", 1, LifecycleState::Failed)];
        let old_key = sessions[0].ledger_key("run-1");
        ledger.upsert(old_key.clone(), "sim-old-session").expect("seed old entry");

        let params = SchedulerParams {
            run_id: "run-1".to_string(),
            mode: RunMode::Mock,
            connected_repos: Vec::new(),
            max_parallelism: 4,
            max_acu_per_session: 5,
            poll_interval: Duration::from_millis(10),
            session_timeout: Duration::from_secs(5400),
            min_success_rate: 0.0,
            max_retries: 2,
        };
        let clients = simulated_clients(clock.clone());
        let mut events = Vec::new();
        let cancellation = CancellationToken::new();

        drive_fake_clock(
            clock.clone(),
            Duration::from_millis(500),
            retry_failures(
                &mut sessions,
                &params,
                &clients,
                &mut ledger,
                &MemoryGraph::default(),
                &[],
                &clock,
                &cancellation,
                &mut events,
            ),
        )
        .await;

        assert_eq!(sessions.len(), 2, "the failed attempt is kept, the retry is appended");
        let retried = &sessions[1];
        assert_eq!(retried.attempt, 2);
        assert!(retried.is_terminal());

        let new_key = retried.ledger_key("run-1");
        assert_ne!(new_key, old_key);
        assert_eq!(ledger.get(&old_key), Some("sim-old-session"), "the old key's entry is untouched");
        let new_session_id = ledger
            .get(&new_key)
            .expect("the retry's own key is recorded")
            .to_string();
        assert_ne!(new_session_id, "sim-old-session");
    }
}
