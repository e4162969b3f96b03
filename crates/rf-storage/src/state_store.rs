// SPDX-License-Identifier: MIT

//! Per-run state persistence: the per-run `state.json`, the append-order
//! run index, and the legacy `./state.json` pointer.

use crate::atomic::{read_json_tolerant, write_json, AtomicIoError};
use crate::lock::{self, LockConfig, LockError};
use rf_core::{BatchRun, Clock, RunSummary};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error(transparent)]
    Io(#[from] AtomicIoError),
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Filesystem root all run state lives under (`<root>/runs/<id>/...`,
/// `<root>/runs/index.json`, `<root>/state.json`).
pub struct StateStore<C: Clock> {
    root: PathBuf,
    lock_config: LockConfig,
    clock: C,
}

impl<C: Clock> StateStore<C> {
    pub fn new(root: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            root: root.into(),
            lock_config: LockConfig::default(),
            clock,
        }
    }

    pub fn with_lock_config(mut self, config: LockConfig) -> Self {
        self.lock_config = config;
        self
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(run_id)
    }

    pub fn run_state_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("state.json")
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("runs").join("index.json")
    }

    pub fn legacy_state_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// Write the per-run state file under lock, then read it back.
    ///
    /// Exposed so the review path can do its own lock-read-mutate-write
    /// cycle against the same file this store writes to.
    pub fn lock_run_state(
        &self,
        run_id: &str,
        writer: &str,
    ) -> Result<lock::FileLockGuard, StateStoreError> {
        let path = self.run_state_path(run_id);
        Ok(lock::acquire(&path, writer, &self.lock_config, &self.clock)?)
    }

    pub fn read_run_state(&self, run_id: &str) -> Result<Option<BatchRun>, StateStoreError> {
        Ok(read_json_tolerant(&self.run_state_path(run_id))?)
    }

    pub fn write_run_state(&self, run: &BatchRun) -> Result<(), StateStoreError> {
        let path = self.run_state_path(run.id.as_str());
        let _guard = lock::acquire(&path, "state-store", &self.lock_config, &self.clock)?;
        write_json(&path, run)?;
        Ok(())
    }

    /// Write the per-run state file while already holding its lock (used by
    /// callers doing their own lock-read-mutate-write cycle, e.g. the
    /// review path).
    pub fn write_run_state_locked(&self, run: &BatchRun) -> Result<(), StateStoreError> {
        write_json(&self.run_state_path(run.id.as_str()), run)?;
        Ok(())
    }

    pub fn upsert_index(&self, summary: &RunSummary) -> Result<(), StateStoreError> {
        let path = self.index_path();
        let _guard = lock::acquire(&path, "state-store", &self.lock_config, &self.clock)?;
        let mut index: Vec<RunSummary> = read_json_tolerant(&path)?.unwrap_or_default();
        match index.iter().position(|s| s.id == summary.id) {
            Some(pos) => index[pos] = summary.clone(),
            None => index.push(summary.clone()),
        }
        write_json(&path, &index)?;
        Ok(())
    }

    pub fn read_index(&self) -> Result<Vec<RunSummary>, StateStoreError> {
        Ok(read_json_tolerant(&self.index_path())?.unwrap_or_default())
    }

    pub fn write_legacy_pointer(&self, run: &BatchRun) -> Result<(), StateStoreError> {
        write_json(&self.legacy_state_path(), run)?;
        Ok(())
    }

    /// Run the three C1 write operations in the order the progress tracker
    /// requires: per-run state, run index (under lock), legacy pointer.
    /// Each write is independent; a failure in one is returned to the
    /// caller (the tracker is expected to log and continue, not abort).
    pub fn persist(&self, run: &BatchRun) -> Result<(), StateStoreError> {
        self.write_run_state(run)?;
        self.upsert_index(&RunSummary::from(run))?;
        self.write_legacy_pointer(run)?;
        Ok(())
    }

    pub fn findings_csv_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("findings.csv")
    }

    pub fn idempotency_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("idempotency.json")
    }

    pub fn memory_root(&self) -> PathBuf {
        self.root.join("memory")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{RunId, RunMode, SystemClock};
    use tempfile::tempdir;

    fn run(id: &str) -> BatchRun {
        BatchRun::new(RunId::new(id), RunMode::Mock, 5, 5, 5, chrono::Utc::now())
    }

    #[test]
    fn persist_writes_all_three_targets() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path(), SystemClock);
        let run = run("run-1");
        store.persist(&run).expect("persist");

        assert!(store.run_state_path("run-1").exists());
        assert!(store.index_path().exists());
        assert!(store.legacy_state_path().exists());

        let loaded = store.read_run_state("run-1").expect("read").expect("present");
        assert_eq!(loaded.id, run.id);
    }

    #[test]
    fn upsert_index_replaces_existing_row_for_same_run() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path(), SystemClock);
        let mut run = run("run-1");
        store.upsert_index(&RunSummary::from(&run)).expect("first upsert");
        run.completed = 3;
        store.upsert_index(&RunSummary::from(&run)).expect("second upsert");

        let index = store.read_index().expect("read index");
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].completed, 3);
    }
}
