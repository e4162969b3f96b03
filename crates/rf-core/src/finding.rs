// SPDX-License-Identifier: MIT

//! Finding: an immutable input record produced by the (external) ingest step.

use crate::id::FindingId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scanner finding category. `Other` is an explicit, recognized category
/// with its own weight — distinct from an unparseable value, which the
/// ingest pipeline drops instead of coercing here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SqlInjection,
    HardcodedSecret,
    DependencyVulnerability,
    PiiLogging,
    MissingEncryption,
    Xss,
    PathTraversal,
    AccessLogging,
    Other,
}

impl Category {
    /// Category component of the ingest-time priority score.
    pub fn weight(self) -> u32 {
        match self {
            Category::SqlInjection => 25,
            Category::HardcodedSecret => 25,
            Category::DependencyVulnerability => 20,
            Category::Xss => 20,
            Category::PathTraversal => 20,
            Category::PiiLogging => 15,
            Category::MissingEncryption => 15,
            Category::AccessLogging => 10,
            Category::Other => 10,
        }
    }

    /// Parse a CSV cell into a category. Unknown strings return `None` (the
    /// row is dropped by the ingest pipeline) rather than coercing to
    /// `Other`, which is itself only ever produced by an explicit match.
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw.trim().to_ascii_lowercase().as_str() {
            "sql_injection" => Category::SqlInjection,
            "hardcoded_secret" => Category::HardcodedSecret,
            "dependency_vulnerability" => Category::DependencyVulnerability,
            "pii_logging" => Category::PiiLogging,
            "missing_encryption" => Category::MissingEncryption,
            "xss" => Category::Xss,
            "path_traversal" => Category::PathTraversal,
            "access_logging" => Category::AccessLogging,
            "other" => Category::Other,
            _ => return None,
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::SqlInjection => "sql_injection",
            Category::HardcodedSecret => "hardcoded_secret",
            Category::DependencyVulnerability => "dependency_vulnerability",
            Category::PiiLogging => "pii_logging",
            Category::MissingEncryption => "missing_encryption",
            Category::Xss => "xss",
            Category::PathTraversal => "path_traversal",
            Category::AccessLogging => "access_logging",
            Category::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Scanner-reported severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity component of the ingest-time priority score.
    pub fn weight(self) -> u32 {
        match self {
            Severity::Critical => 40,
            Severity::High => 30,
            Severity::Medium => 15,
            Severity::Low => 5,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => return None,
        })
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// An immutable scanner finding. Created by the ingest step; never mutated
/// once a run has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub scanner: String,
    pub category: Category,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub service_name: String,
    pub repo_url: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwe_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Computed at ingest time: severity weight + category weight + service weight.
    pub priority_score: u32,
}

impl Finding {
    /// Key used to collapse duplicate findings reported by multiple scanners
    /// for the same underlying location.
    pub fn dedup_key(&self) -> (String, String, Option<u32>, Category) {
        (
            self.service_name.clone(),
            self.file_path.clone(),
            self.line_number,
            self.category,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_weights_are_stable() {
        assert_eq!(Category::SqlInjection.weight(), 25);
        assert_eq!(Category::HardcodedSecret.weight(), 25);
        assert_eq!(Category::DependencyVulnerability.weight(), 20);
        assert_eq!(Category::Xss.weight(), 20);
        assert_eq!(Category::PathTraversal.weight(), 20);
        assert_eq!(Category::PiiLogging.weight(), 15);
        assert_eq!(Category::MissingEncryption.weight(), 15);
        assert_eq!(Category::AccessLogging.weight(), 10);
        assert_eq!(Category::Other.weight(), 10);
    }

    #[test]
    fn severity_weights_are_stable() {
        assert_eq!(Severity::Critical.weight(), 40);
        assert_eq!(Severity::High.weight(), 30);
        assert_eq!(Severity::Medium.weight(), 15);
        assert_eq!(Severity::Low.weight(), 5);
    }

    #[test]
    fn unknown_category_is_rejected_not_coerced() {
        assert_eq!(Category::parse("other"), Some(Category::Other));
        assert_eq!(Category::parse("not_a_real_category"), None);
    }
}
