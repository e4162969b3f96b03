// SPDX-License-Identifier: MIT

//! Run supervisor (C10): owns one `BatchRun` end to end — preflight, wave
//! construction with every session pre-created at `PENDING`, sequential
//! wave execution, memory extraction, and interrupt handling. Driven by the
//! `rf-runner` binary's `main`, one supervisor per process.

use crate::config::EngineConfig;
use crate::error::{SchedulerError, SupervisorError};
use crate::preflight;
use crate::scheduler::{self, SchedulerParams};
use crate::session_manager::{self, BackendClients};
use crate::tracker::ProgressTracker;
use crate::wave_builder;
use rf_agent::{
    CircuitBreakerConfig, HardenedClient, RemoteAgentBackend, RetryConfig, SimulatedAgentBackend,
};
use rf_core::{
    BatchRun, Clock, Finding, MemoryGraph, MemoryItem, Outcome, RemediationSession, RunId, RunMode,
};
use rf_storage::{AtomicIoError, IdempotencyLedger, MemoryStore, StateStore, StateStoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// `runs/<id>/bootstrap.json`: the one marker preflight failure is allowed
/// to leave behind, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapStatus {
    Starting,
    Started,
    FailedToSpawn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bootstrap {
    pub status: BootstrapStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn write_bootstrap(path: &Path, bootstrap: &Bootstrap) -> Result<(), AtomicIoError> {
    rf_storage::write_json(path, bootstrap)
}

/// What the HTTP boundary needs to build a [`Supervisor`]: everything it
/// already wrote to disk (findings CSV, wave size, mode) plus the live
/// backend's credentials, if any.
pub struct SupervisorParams {
    pub run_id: String,
    pub mode: RunMode,
    pub wave_size: usize,
    pub connected_repos: Vec<String>,
    pub live_bearer_token: Option<String>,
    pub live_base_url: Option<String>,
}

/// Drives one run from preflight through completion or interruption.
pub struct Supervisor<C: Clock> {
    root: PathBuf,
    playbooks_dir: PathBuf,
    config: EngineConfig,
    clock: C,
}

impl<C: Clock> Supervisor<C> {
    pub fn new(root: impl Into<PathBuf>, playbooks_dir: impl Into<PathBuf>, config: EngineConfig, clock: C) -> Self {
        Self {
            root: root.into(),
            playbooks_dir: playbooks_dir.into(),
            config,
            clock,
        }
    }

    /// Run `params.run_id` to completion (or until `cancellation` fires).
    /// `findings` must already be parsed and priority-sorted by the caller
    /// (the boundary surface does this once at upload time, persisting the
    /// CSV to `findings.csv` before the supervisor process is spawned).
    pub async fn run(
        &self,
        params: SupervisorParams,
        findings: Vec<Finding>,
        cancellation: &CancellationToken,
    ) -> Result<BatchRun, SupervisorError> {
        let store = StateStore::new(&self.root, self.clock.clone());
        let run_dir = store.run_dir(&params.run_id);
        let bootstrap_path = run_dir.join("bootstrap.json");
        let started_at = self.clock.now();

        write_bootstrap(
            &bootstrap_path,
            &Bootstrap {
                status: BootstrapStatus::Starting,
                started_at,
                run_id: params.run_id.clone(),
                pid: Some(std::process::id()),
                error: None,
            },
        )
        .map_err(StateStoreError::Io)?;

        let has_live_credentials = params.live_bearer_token.is_some() && params.live_base_url.is_some();
        let live_client = match (&params.live_base_url, &params.live_bearer_token) {
            (Some(base_url), Some(token)) => Some(HardenedClient::new(
                RemoteAgentBackend::new(base_url.clone(), token.clone()),
                self.clock.clone(),
                RetryConfig::default(),
                CircuitBreakerConfig {
                    failure_threshold: self.config.circuit_breaker_threshold,
                    cooldown: self.config.circuit_breaker_cooldown,
                },
            )),
            _ => None,
        };

        if let Err(err) = preflight::run(
            &findings,
            params.mode,
            &params.connected_repos,
            &self.playbooks_dir,
            has_live_credentials,
            live_client.as_ref(),
            cancellation,
        )
        .await
        {
            write_bootstrap(
                &bootstrap_path,
                &Bootstrap {
                    status: BootstrapStatus::FailedToSpawn,
                    started_at,
                    run_id: params.run_id.clone(),
                    pid: Some(std::process::id()),
                    error: Some(err.to_string()),
                },
            )
            .map_err(StateStoreError::Io)?;
            return Err(SupervisorError::Preflight(err));
        }

        write_bootstrap(
            &bootstrap_path,
            &Bootstrap {
                status: BootstrapStatus::Started,
                started_at,
                run_id: params.run_id.clone(),
                pid: Some(std::process::id()),
                error: None,
            },
        )
        .map_err(StateStoreError::Io)?;

        let clients = BackendClients {
            live: live_client,
            simulated: HardenedClient::new(
                SimulatedAgentBackend::new(self.clock.clone(), seed_from_run_id(&params.run_id)),
                self.clock.clone(),
                RetryConfig::default(),
                CircuitBreakerConfig {
                    failure_threshold: self.config.circuit_breaker_threshold,
                    cooldown: self.config.circuit_breaker_cooldown,
                },
            ),
        };

        let mut waves = wave_builder::build_waves(&findings, params.wave_size, started_at);
        let mut run = BatchRun::new(
            RunId::new(params.run_id.clone()),
            params.mode,
            findings.len() as u32,
            params.wave_size as u32,
            self.config.max_parallel_sessions as u32,
            started_at,
        );
        run.source_csv = Some("findings.csv".to_string());
        run.status = rf_core::RunStatus::Running;
        run.waves = waves.clone();

        let findings_by_id: std::collections::HashMap<_, _> =
            findings.iter().map(|f| (f.id.clone(), f.clone())).collect();
        for wave in &waves {
            for finding_id in &wave.finding_ids {
                let Some(finding) = findings_by_id.get(finding_id) else { continue };
                let data_source = session_manager::select_data_source(params.mode, finding, &params.connected_repos);
                let playbook_id = crate::playbook::playbook_id(finding.category);
                run.sessions.push(RemediationSession::new(
                    finding.clone(),
                    playbook_id,
                    wave.number,
                    1,
                    data_source,
                    started_at,
                ));
            }
        }

        let tracker = ProgressTracker::new(&store);
        tracker.run_started(&mut run, self.clock.now());

        let mut ledger = IdempotencyLedger::load(store.idempotency_path(&params.run_id))
            .map_err(SchedulerError::Ledger)?;
        let memory_store = MemoryStore::new(store.memory_root(), self.clock.clone());
        let memory_graph = memory_store.load_graph()?;
        let narratives = load_narratives(&memory_store, &memory_graph);

        let scheduler_params = SchedulerParams {
            run_id: params.run_id.clone(),
            mode: params.mode,
            connected_repos: params.connected_repos.clone(),
            max_parallelism: self.config.max_parallel_sessions,
            max_acu_per_session: self.config.max_acu_per_session,
            poll_interval: self.config.poll_interval,
            session_timeout: self.config.session_timeout,
            min_success_rate: self.config.min_success_rate,
            max_retries: self.config.max_retries,
        };

        'waves: for wave in &mut waves {
            if cancellation.is_cancelled() {
                break 'waves;
            }
            run.current_wave = wave.number;
            let mut wave_sessions: Vec<RemediationSession> = run
                .sessions
                .iter()
                .filter(|s| s.wave_number == wave.number && s.attempt == 1)
                .cloned()
                .collect();

            let outcome = scheduler::run_wave(
                wave,
                &mut wave_sessions,
                &scheduler_params,
                &clients,
                &mut ledger,
                &memory_graph,
                &narratives,
                &self.clock,
                cancellation,
            )
            .await;

            replace_wave_sessions(&mut run.sessions, wave.number, wave_sessions);
            if let Some(slot) = run.waves.iter_mut().find(|w| w.number == wave.number) {
                *slot = wave.clone();
            }
            for event in outcome.events {
                tracker.record(&mut run, event);
            }

            if outcome.gated {
                tracker.run_gated(&mut run);
                break 'waves;
            }
        }

        if cancellation.is_cancelled() {
            tracker.run_interrupted(&mut run);
            return Ok(run);
        }

        extract_memory(&run, &memory_store);

        let now = self.clock.now();
        tracker.run_completed(&mut run, now);

        Ok(run)
    }
}

/// Splice a wave's (post-dispatch-and-retry) sessions back into the run's
/// full session list: the wave's original attempt-1 entries are replaced in
/// place and any retries appended are kept after them.
fn replace_wave_sessions(all: &mut Vec<RemediationSession>, wave_number: u32, updated: Vec<RemediationSession>) {
    all.retain(|s| s.wave_number != wave_number);
    all.extend(updated);
}

fn seed_from_run_id(run_id: &str) -> u64 {
    let mut seed: u64 = 0;
    for byte in run_id.as_bytes() {
        seed = seed.wrapping_mul(31).wrapping_add(*byte as u64);
    }
    seed
}

fn load_narratives(memory_store: &MemoryStore<impl Clock>, graph: &MemoryGraph) -> Vec<(String, String)> {
    graph
        .items
        .iter()
        .filter_map(|entry| {
            memory_store
                .read_narrative(&entry.id)
                .ok()
                .map(|narrative| (entry.id.clone(), narrative))
        })
        .collect()
}

/// Write a memory item for every terminal session the run produced.
/// Failures are logged and otherwise ignored — the memory store is
/// advisory, never load-bearing for run completion.
fn extract_memory(run: &BatchRun, memory_store: &MemoryStore<impl Clock>) {
    for session in &run.sessions {
        if !session.is_terminal() {
            continue;
        }
        let outcome = if session.state == rf_core::LifecycleState::Success {
            Outcome::Success
        } else {
            Outcome::Failed
        };
        let confidence = session
            .structured_output
            .as_ref()
            .map(|s| s.confidence)
            .unwrap_or(rf_core::Confidence::Low);
        let item = MemoryItem {
            id: MemoryItem::id_for(run.id.as_str(), session.finding.id.as_str()),
            run_id: run.id.as_str().to_string(),
            finding_id: session.finding.id.as_str().to_string(),
            category: session.finding.category,
            service: session.finding.service_name.clone(),
            severity: session.finding.severity,
            outcome,
            confidence,
            data_source: session.data_source,
            fix_approach: session.structured_output.as_ref().and_then(|s| s.fix_approach.clone()),
            files_modified: session
                .structured_output
                .as_ref()
                .map(|s| s.files_modified.clone())
                .unwrap_or_default(),
            tests_passed: session.structured_output.as_ref().and_then(|s| s.tests_passed),
            pr_url: session.pr_url.clone(),
            error_text: session.error_message.clone(),
            created_at: session.completed_at.unwrap_or(session.created_at),
        };
        if let Err(err) = memory_store.upsert(&item) {
            tracing::warn!(session = %session.finding.id, error = %err, "failed to extract memory item");
        }
    }
}
