// SPDX-License-Identifier: MIT

//! Read-only metrics derived from a `BatchRun`, backing the `/eval` and
//! `/ops` HTTP endpoints (§6). Pure functions over an already-loaded run —
//! no I/O, no locking; the boundary is responsible for loading the latest
//! run and serializing these structs.

use chrono::{DateTime, Utc};
use rf_core::{BatchRun, Confidence, LifecycleState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-category remediation health, one row per category present in the
/// run's sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryMetrics {
    pub category: String,
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub pass_rate: f64,
    pub avg_duration_minutes: Option<f64>,
    pub retry_count: u32,
    pub avg_confidence: Option<f64>,
    pub health: &'static str,
}

fn health_label(pass_rate: f64, total: u32) -> &'static str {
    if total < 3 {
        "insufficient_data"
    } else if pass_rate >= 0.8 {
        "healthy"
    } else if pass_rate >= 0.5 {
        "degraded"
    } else {
        "critical"
    }
}

/// Severity ordering used to sort `/eval` rows critical-first. Data-starved
/// categories are surfaced right after genuinely unhealthy ones, since both
/// need an operator's attention before "healthy" rows do.
fn health_rank(health: &str) -> u8 {
    match health {
        "critical" => 0,
        "degraded" => 1,
        "insufficient_data" => 2,
        _ => 3,
    }
}

fn duration_minutes(created_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    (completed_at - created_at).num_milliseconds() as f64 / 60_000.0
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Compute per-category metrics for every category appearing among the
/// run's sessions, sorted critical-first.
pub fn eval_metrics(run: &BatchRun) -> Vec<CategoryMetrics> {
    let mut by_category: BTreeMap<String, Vec<&rf_core::RemediationSession>> = BTreeMap::new();
    for session in &run.sessions {
        by_category
            .entry(session.finding.category.to_string())
            .or_default()
            .push(session);
    }

    let mut rows: Vec<CategoryMetrics> = by_category
        .into_iter()
        .map(|(category, sessions)| {
            let total = sessions.len() as u32;
            let succeeded = sessions
                .iter()
                .filter(|s| s.state == LifecycleState::Success)
                .count() as u32;
            let failed = sessions
                .iter()
                .filter(|s| {
                    matches!(
                        s.state,
                        LifecycleState::Failed | LifecycleState::Timeout | LifecycleState::Blocked
                    )
                })
                .count() as u32;
            let pass_rate = if total > 0 {
                f64::from(succeeded) / f64::from(total)
            } else {
                0.0
            };
            let durations: Vec<f64> = sessions
                .iter()
                .filter_map(|s| s.completed_at.map(|done| duration_minutes(s.created_at, done)))
                .collect();
            let retry_count = sessions.iter().filter(|s| s.attempt > 1).count() as u32;
            let confidences: Vec<f64> = sessions
                .iter()
                .filter_map(|s| s.structured_output.as_ref())
                .map(|out| match out.confidence {
                    Confidence::High => 1.0,
                    Confidence::Medium => 0.5,
                    Confidence::Low => 0.25,
                })
                .collect();

            CategoryMetrics {
                category,
                total,
                succeeded,
                failed,
                pass_rate,
                avg_duration_minutes: average(&durations),
                retry_count,
                avg_confidence: average(&confidences),
                health: health_label(pass_rate, total),
            }
        })
        .collect();

    rows.sort_by(|a, b| health_rank(a.health).cmp(&health_rank(b.health)).then(a.category.cmp(&b.category)));
    rows
}

/// Timing/throughput/budget metrics for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpsMetrics {
    pub p50_duration_minutes: Option<f64>,
    pub p95_duration_minutes: Option<f64>,
    pub avg_duration_minutes: Option<f64>,
    pub min_duration_minutes: Option<f64>,
    pub max_duration_minutes: Option<f64>,
    pub sessions_per_hour: Option<f64>,
    pub projected_remaining_minutes: Option<f64>,
    pub estimated_compute_units: Option<f64>,
    pub estimated_budget: f64,
    pub burn_rate_per_hour: Option<f64>,
    pub current_wave: u32,
    pub elapsed_minutes: f64,
}

/// Minimum elapsed time before a throughput/burn-rate figure is reported;
/// below this, division produces a number too noisy to be useful.
const MIN_ELAPSED_MINUTES_FOR_RATE: f64 = 1.0;

/// Nearest-rank percentile over an already-sorted slice.
fn nearest_rank(sorted: &[f64], percentile: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (percentile / 100.0 * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[index])
}

pub fn ops_metrics(run: &BatchRun, max_acu_per_session: u32, now: DateTime<Utc>) -> OpsMetrics {
    let mut durations: Vec<f64> = run
        .sessions
        .iter()
        .filter(|s| s.is_terminal())
        .filter_map(|s| s.completed_at.map(|done| duration_minutes(s.created_at, done)))
        .collect();
    durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let elapsed_at = run.completed_at.unwrap_or(now);
    let elapsed_minutes = (elapsed_at - run.started_at).num_milliseconds() as f64 / 60_000.0;
    let elapsed_hours = elapsed_minutes / 60.0;
    let rate_is_meaningful = elapsed_minutes >= MIN_ELAPSED_MINUTES_FOR_RATE;

    let sessions_per_hour = if rate_is_meaningful && elapsed_hours > 0.0 {
        Some(f64::from(run.completed) / elapsed_hours)
    } else {
        None
    };

    let projected_remaining_minutes = match sessions_per_hour {
        Some(rate) if rate > 0.0 => Some(f64::from(run.remaining()) / (rate / 60.0)),
        _ => None,
    };

    let estimated_compute_units = if durations.is_empty() {
        None
    } else {
        Some(durations.iter().map(|minutes| minutes / 15.0).sum())
    };

    let estimated_budget = f64::from(run.total_findings) * f64::from(max_acu_per_session);

    let burn_rate_per_hour = match (estimated_compute_units, rate_is_meaningful) {
        (Some(units), true) if elapsed_hours > 0.0 => Some(units / elapsed_hours),
        _ => None,
    };

    let current_wave = run
        .sessions
        .iter()
        .filter(|s| s.state != LifecycleState::Pending)
        .map(|s| s.wave_number)
        .max()
        .unwrap_or(0);

    OpsMetrics {
        p50_duration_minutes: nearest_rank(&durations, 50.0),
        p95_duration_minutes: nearest_rank(&durations, 95.0),
        avg_duration_minutes: average(&durations),
        min_duration_minutes: durations.first().copied(),
        max_duration_minutes: durations.last().copied(),
        sessions_per_hour,
        projected_remaining_minutes,
        estimated_compute_units,
        estimated_budget,
        burn_rate_per_hour,
        current_wave,
        elapsed_minutes,
    }
}
