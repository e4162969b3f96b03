// SPDX-License-Identifier: MIT

//! Memory items: narrative records distilled from terminal sessions, and
//! the metadata-only index (graph) that links and ranks them.

use crate::finding::{Category, Severity};
use crate::lifecycle::DataSource;
use crate::structured_output::Confidence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome a memory item records, independent of the originating session's
/// internal lifecycle state (which also tracks non-terminal states this
/// never needs to represent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
}

/// A narrative markdown document produced from one terminal session. Id is
/// `{run_id}-{finding_id}`, so reruns of the same finding produce distinct
/// items rather than overwriting the prior run's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub run_id: String,
    pub finding_id: String,
    pub category: Category,
    pub service: String,
    pub severity: Severity,
    pub outcome: Outcome,
    pub confidence: Confidence,
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_approach: Option<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MemoryItem {
    pub fn id_for(run_id: &str, finding_id: &str) -> String {
        format!("{run_id}-{finding_id}")
    }

    /// Render the full narrative body stored at `items/<id>.md`. The index
    /// only ever stores the metadata fields above; this is reconstructed on
    /// upsert and never parsed back out of the markdown.
    pub fn to_markdown(&self) -> String {
        let mut body = String::new();
        body.push_str(&format!("# {}\n\n", self.id));
        body.push_str(&format!("- run: {}\n", self.run_id));
        body.push_str(&format!("- finding: {}\n", self.finding_id));
        body.push_str(&format!("- category: {}\n", self.category));
        body.push_str(&format!("- service: {}\n", self.service));
        body.push_str(&format!("- severity: {}\n", self.severity));
        body.push_str(&format!("- outcome: {:?}\n", self.outcome));
        body.push_str(&format!("- data source: {}\n", self.data_source));
        if let Some(approach) = &self.fix_approach {
            body.push_str(&format!("\n## Fix approach\n\n{approach}\n"));
        }
        if !self.files_modified.is_empty() {
            body.push_str("\n## Files modified\n\n");
            for file in &self.files_modified {
                body.push_str(&format!("- {file}\n"));
            }
        }
        if let Some(pr_url) = &self.pr_url {
            body.push_str(&format!("\n## Pull request\n\n{pr_url}\n"));
        }
        if let Some(error) = &self.error_text {
            body.push_str(&format!("\n## Error\n\n{error}\n"));
        }
        body
    }
}

/// Metadata-only index row. Kept separate from the markdown narrative so
/// the graph can be loaded cheaply for ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryIndexEntry {
    pub id: String,
    pub run_id: String,
    pub category: Category,
    pub service: String,
    pub severity: Severity,
    pub outcome: Outcome,
    pub confidence: Confidence,
    pub data_source: DataSource,
    pub created_at: DateTime<Utc>,
}

impl From<&MemoryItem> for MemoryIndexEntry {
    fn from(item: &MemoryItem) -> Self {
        Self {
            id: item.id.clone(),
            run_id: item.run_id.clone(),
            category: item.category,
            service: item.service.clone(),
            severity: item.severity,
            outcome: item.outcome,
            confidence: item.confidence,
            data_source: item.data_source,
            created_at: item.created_at,
        }
    }
}

/// Metadata-only knowledge graph: the index entries plus symmetric
/// `same_category`/`same_service` relationships between item ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryGraph {
    pub items: Vec<MemoryIndexEntry>,
    pub same_category: Vec<(String, String)>,
    pub same_service: Vec<(String, String)>,
}

impl MemoryGraph {
    /// Insert `entry`, computing `same_category`/`same_service` links
    /// against the existing index and recording both endpoints of each new
    /// relationship.
    pub fn upsert(&mut self, entry: MemoryIndexEntry) {
        for existing in &self.items {
            if existing.id == entry.id {
                continue;
            }
            if existing.category == entry.category {
                self.same_category.push((existing.id.clone(), entry.id.clone()));
                self.same_category.push((entry.id.clone(), existing.id.clone()));
            }
            if existing.service == entry.service {
                self.same_service.push((existing.id.clone(), entry.id.clone()));
                self.same_service.push((entry.id.clone(), existing.id.clone()));
            }
        }
        self.items.retain(|existing| existing.id != entry.id);
        self.items.push(entry);
    }
}
