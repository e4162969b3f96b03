// SPDX-License-Identifier: MIT

//! Preflight (C9): pure validation run before any wave is dispatched. No
//! state mutation on failure — the caller is responsible for recording the
//! `bootstrap.json` `failed_to_spawn` marker per §6.

use crate::error::PreflightError;
use crate::playbook;
use rf_agent::{HardenedClient, RemoteAgentBackend};
use rf_core::{Clock, Finding, RunMode};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Validate everything the scheduler will assume is already true:
/// credentials for live/hybrid mode, backend reachability, every
/// playbook file the findings' categories need, a non-empty connected-repo
/// list for hybrid mode, and at least one finding to work.
pub async fn run<C: Clock>(
    findings: &[Finding],
    mode: RunMode,
    connected_repos: &[String],
    playbooks_dir: &Path,
    has_live_credentials: bool,
    live_client: Option<&HardenedClient<RemoteAgentBackend, C>>,
    cancellation: &CancellationToken,
) -> Result<(), PreflightError> {
    if findings.is_empty() {
        return Err(PreflightError::NoFindings);
    }

    if matches!(mode, RunMode::Hybrid) && connected_repos.is_empty() {
        return Err(PreflightError::EmptyConnectedRepos);
    }

    if matches!(mode, RunMode::Live | RunMode::Hybrid) {
        if !has_live_credentials {
            let mode_name = if matches!(mode, RunMode::Live) { "live" } else { "hybrid" };
            return Err(PreflightError::MissingCredentials { mode: mode_name });
        }
        if let Some(client) = live_client {
            client
                .list_playbooks(cancellation)
                .await
                .map_err(|err| PreflightError::BackendUnreachable(err.to_string()))?;
        }
    }

    if let Some(missing) = playbook::missing_playbooks(playbooks_dir, findings).into_iter().next() {
        return Err(PreflightError::MissingPlaybook(missing));
    }

    Ok(())
}
