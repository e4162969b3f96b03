// SPDX-License-Identifier: MIT

//! Filesystem persistence for the memory store: `graph.json` (metadata
//! index) plus one `items/<id>.md` narrative file per item. Ranking and
//! retrieval scoring live in the engine; this module is I/O only.

use crate::atomic::{read_json_tolerant, write_json, AtomicIoError};
use crate::lock::{self, LockConfig, LockError};
use rf_core::{Clock, MemoryGraph, MemoryIndexEntry, MemoryItem};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error(transparent)]
    Io(#[from] AtomicIoError),
    #[error(transparent)]
    Lock(#[from] LockError),
}

pub struct MemoryStore<C: Clock> {
    root: PathBuf,
    lock_config: LockConfig,
    clock: C,
}

impl<C: Clock> MemoryStore<C> {
    pub fn new(root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            root: root.into(),
            lock_config: LockConfig::default(),
            clock,
        }
    }

    pub fn graph_path(&self) -> PathBuf {
        self.root.join("graph.json")
    }

    pub fn item_path(&self, item_id: &str) -> PathBuf {
        self.root.join("items").join(format!("{item_id}.md"))
    }

    /// Load the index. A missing or corrupt graph loads as empty — items
    /// already written to disk remain independently usable by id.
    pub fn load_graph(&self) -> Result<MemoryGraph, MemoryStoreError> {
        Ok(read_json_tolerant(&self.graph_path())?.unwrap_or_default())
    }

    /// Upsert `item`: write its narrative file, then update the index entry
    /// and relationship links under the lock + atomic rename protocol.
    pub fn upsert(&self, item: &MemoryItem) -> Result<(), MemoryStoreError> {
        let item_path = self.item_path(&item.id);
        if let Some(parent) = item_path.parent() {
            std::fs::create_dir_all(parent).map_err(AtomicIoError::Io)?;
        }
        std::fs::write(&item_path, item.to_markdown()).map_err(AtomicIoError::Io)?;

        let graph_path = self.graph_path();
        let _guard = lock::acquire(&graph_path, "memory-store", &self.lock_config, &self.clock)?;
        let mut graph: MemoryGraph = read_json_tolerant(&graph_path)?.unwrap_or_default();
        graph.upsert(MemoryIndexEntry::from(item));
        write_json(&graph_path, &graph)?;
        Ok(())
    }

    pub fn read_narrative(&self, item_id: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.item_path(item_id))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{Category, Confidence, DataSource, Outcome, Severity, SystemClock};
    use tempfile::tempdir;

    fn item(id: &str, category: Category, service: &str) -> MemoryItem {
        MemoryItem {
            id: id.to_string(),
            run_id: "run-1".to_string(),
            finding_id: id.to_string(),
            category,
            service: service.to_string(),
            severity: Severity::High,
            outcome: Outcome::Success,
            confidence: Confidence::High,
            data_source: DataSource::Live,
            fix_approach: Some("parameterized the query".to_string()),
            files_modified: vec!["app/db.py".to_string()],
            tests_passed: Some(true),
            pr_url: Some("https://example/pr/1".to_string()),
            error_text: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn upsert_writes_narrative_and_index() {
        let dir = tempdir().expect("tempdir");
        let store = MemoryStore::new(dir.path(), SystemClock);
        let item = item("run-1-f-1", Category::SqlInjection, "svc-a");
        store.upsert(&item).expect("upsert");

        assert!(store.item_path(&item.id).exists());
        let graph = store.load_graph().expect("load graph");
        assert_eq!(graph.items.len(), 1);
        assert_eq!(graph.items[0].id, item.id);

        let narrative = store.read_narrative(&item.id).expect("read narrative");
        assert!(narrative.contains("parameterized the query"));
    }

    #[test]
    fn second_upsert_links_related_items() {
        let dir = tempdir().expect("tempdir");
        let store = MemoryStore::new(dir.path(), SystemClock);
        store
            .upsert(&item("run-1-f-1", Category::SqlInjection, "svc-a"))
            .expect("first upsert");
        store
            .upsert(&item("run-2-f-1", Category::SqlInjection, "svc-b"))
            .expect("second upsert");

        let graph = store.load_graph().expect("load graph");
        assert_eq!(graph.items.len(), 2);
        assert!(graph
            .same_category
            .contains(&("run-1-f-1".to_string(), "run-2-f-1".to_string())));
    }
}
