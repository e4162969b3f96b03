// SPDX-License-Identifier: MIT

//! Append-only event log recorded alongside a run's state.

use crate::id::{FindingId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a timeline event. Kept as an open-ended tag plus a payload rather
/// than one variant-per-field struct, since consumers (the CLI, the HTTP
/// boundary's run-detail view) only ever need to render it, never branch on
/// its shape beyond the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    WaveStarted,
    SessionStarted,
    SessionProgress,
    SessionCompleted,
    SessionFailed,
    SessionRetry,
    WaveCompleted,
    WaveGated,
    RunCompleted,
    ReviewApproved,
    ReviewRejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub run_id: RunId,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding_id: Option<FindingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl TimelineEvent {
    pub fn new(run_id: RunId, kind: EventKind, at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            kind,
            at,
            wave_number: None,
            finding_id: None,
            message: None,
            detail: None,
        }
    }

    pub fn with_finding(mut self, finding_id: FindingId) -> Self {
        self.finding_id = Some(finding_id);
        self
    }

    pub fn with_wave(mut self, wave_number: u32) -> Self {
        self.wave_number = Some(wave_number);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_set_optional_fields() {
        let event = TimelineEvent::new(RunId::new("run-1"), EventKind::SessionFailed, Utc::now())
            .with_finding(FindingId::new("f-1"))
            .with_wave(2)
            .with_message("backend returned expired");
        assert_eq!(event.finding_id, Some(FindingId::new("f-1")));
        assert_eq!(event.wave_number, Some(2));
        assert_eq!(event.message.as_deref(), Some("backend returned expired"));
        assert!(event.detail.is_none());
    }

    #[test]
    fn serializes_kind_as_snake_case() {
        let event = TimelineEvent::new(RunId::new("run-1"), EventKind::WaveGated, Utc::now());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "wave_gated");
    }
}
