// SPDX-License-Identifier: MIT

//! The rolling structured-output document a session emits.
//!
//! The blob is freely shaped per playbook; the core only interprets the
//! documented schema keys and keeps everything else in a verbatim fallback
//! bag rather than failing to deserialize unknown agents' output.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionReportStatus {
    Analyzing,
    Fixing,
    Testing,
    CreatingPr,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Numeric weight used by memory retrieval ranking and eval metrics.
    pub fn bonus(self) -> f64 {
        match self {
            Confidence::High => 3.0,
            Confidence::Medium => 1.5,
            Confidence::Low => 0.5,
        }
    }

    /// Confidence mapping used by `/eval`'s average-confidence metric.
    pub fn score(self) -> f64 {
        match self {
            Confidence::High => 1.0,
            Confidence::Medium => 0.5,
            Confidence::Low => 0.25,
        }
    }
}

/// Structured output record. `finding_id`, `status`, `progress_pct`, and
/// `current_step` are required at every report; everything else is
/// optional and accumulates across reports (files_modified only grows,
/// fix_approach/pr_url/error_message are set once observed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredOutput {
    pub finding_id: String,
    pub status: SessionReportStatus,
    pub progress_pct: u8,
    pub current_step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_approach: Option<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<bool>,
    #[serde(default)]
    pub tests_added: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub confidence: Confidence,
    /// Verbatim fallback bag for playbook-specific keys not in this schema.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
