// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-storage: atomic, lock-protected persistence for run state, the
//! idempotency ledger, and the cross-run memory store.

pub mod atomic;
pub mod ledger;
pub mod lock;
pub mod memory_store;
pub mod state_store;

pub use atomic::{read_json_tolerant, write_json, AtomicIoError};
pub use ledger::IdempotencyLedger;
pub use lock::{FileLockGuard, LockConfig, LockError};
pub use memory_store::{MemoryStore, MemoryStoreError};
pub use state_store::{StateStore, StateStoreError};
