// SPDX-License-Identifier: MIT

//! Wave: one batch of sessions dispatched and driven to completion together.

use crate::id::FindingId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a wave stopped accepting new dispatches before its planned size was
/// reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// The wave's planned findings were exhausted.
    Exhausted,
    /// The run-level concurrency budget was hit.
    ConcurrencyLimit,
    /// A human paused the run between waves.
    ManualPause,
    /// This wave's success rate fell below the configured minimum, pausing
    /// the run before the next wave is dispatched.
    MinSuccessRateNotMet,
}

/// One batch of concurrently-driven remediation sessions.
///
/// A wave owns a fixed list of finding ids chosen at build time; sessions for
/// those findings are created once and retried in place rather than moved to
/// a later wave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    pub number: u32,
    pub finding_ids: Vec<FindingId>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_reason: Option<GateReason>,
}

impl Wave {
    pub fn new(number: u32, finding_ids: Vec<FindingId>, started_at: DateTime<Utc>) -> Self {
        Self {
            number,
            finding_ids,
            started_at,
            completed_at: None,
            gate_reason: None,
        }
    }

    pub fn close(&mut self, at: DateTime<Utc>, reason: GateReason) {
        if self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
        self.gate_reason = Some(reason);
    }

    pub fn is_closed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn size(&self) -> usize {
        self.finding_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_idempotent_on_completed_at() {
        let mut wave = Wave::new(1, vec![FindingId::new("f-1")], Utc::now());
        let first_close = Utc::now();
        wave.close(first_close, GateReason::Exhausted);
        let later = first_close + chrono::Duration::seconds(10);
        wave.close(later, GateReason::ManualPause);
        assert_eq!(wave.completed_at, Some(first_close));
        assert_eq!(wave.gate_reason, Some(GateReason::ManualPause));
    }

    #[test]
    fn size_reflects_finding_count() {
        let wave = Wave::new(
            1,
            vec![FindingId::new("f-1"), FindingId::new("f-2")],
            Utc::now(),
        );
        assert_eq!(wave.size(), 2);
        assert!(!wave.is_closed());
    }
}
