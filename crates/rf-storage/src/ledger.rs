// SPDX-License-Identifier: MIT

//! Idempotency ledger: `{run_id}-{finding_id}-attempt-{attempt}` -> session
//! id. Written only by the owning engine process, so writes use atomic
//! rename without the cross-process file lock.

use crate::atomic::{read_json_tolerant, write_json, AtomicIoError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Persisted per-run idempotency mapping.
pub struct IdempotencyLedger {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl IdempotencyLedger {
    /// Load the ledger at `path`. A missing or corrupt file loads as empty
    /// rather than failing — the run must not abort over this.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AtomicIoError> {
        let path = path.into();
        let entries = read_json_tolerant(&path)?.unwrap_or_default();
        Ok(Self { path, entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert or overwrite `key -> session_id` and persist immediately.
    /// Ledger writes are upsert-only: an existing key is never removed.
    pub fn upsert(&mut self, key: impl Into<String>, session_id: impl Into<String>) -> Result<(), AtomicIoError> {
        self.entries.insert(key.into(), session_id.into());
        self.save()
    }

    pub fn save(&self) -> Result<(), AtomicIoError> {
        write_json(&self.path, &self.entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
