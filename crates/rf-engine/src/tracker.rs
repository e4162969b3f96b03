// SPDX-License-Identifier: MIT

//! Progress tracker (C7): the single place that mutates the in-memory
//! `BatchRun`, recounts from the session list, appends a timeline event, and
//! persists. Never increments counters independently of `BatchRun::recount`.

use chrono::{DateTime, Utc};
use rf_core::{BatchRun, Clock, EventKind, TimelineEvent};
use rf_storage::StateStore;

/// Owns the authoritative in-memory `BatchRun` for one run and drives its
/// persistence through `rf_storage::StateStore`. Storage failures are
/// logged, never propagated — per §7 the run must continue even if a
/// particular save fails.
pub struct ProgressTracker<'a, C: Clock> {
    store: &'a StateStore<C>,
}

impl<'a, C: Clock> ProgressTracker<'a, C> {
    pub fn new(store: &'a StateStore<C>) -> Self {
        Self { store }
    }

    /// Append `event` to `run.timeline`, recompute rolling counts from
    /// `run.sessions`, then persist to all three C1 targets in order. Swallows
    /// storage errors into a `tracing::error!` rather than returning them.
    pub fn record(&self, run: &mut BatchRun, event: TimelineEvent) {
        run.push_event(event);
        run.recount();
        if let Err(err) = self.store.persist(run) {
            tracing::error!(run_id = %run.id, error = %err, "failed to persist run state");
        }
    }

    pub fn run_started(&self, run: &mut BatchRun, now: DateTime<Utc>) {
        let event = TimelineEvent::new(run.id.clone(), EventKind::RunStarted, now);
        self.record(run, event);
    }

    pub fn run_completed(&self, run: &mut BatchRun, now: DateTime<Utc>) {
        run.mark_completed(now);
        let event = TimelineEvent::new(run.id.clone(), EventKind::RunCompleted, now);
        self.record(run, event);
    }

    pub fn run_interrupted(&self, run: &mut BatchRun) {
        run.mark_interrupted();
        if let Err(err) = self.store.persist(run) {
            tracing::error!(run_id = %run.id, error = %err, "failed to persist interrupted run state");
        }
    }

    /// A wave failed its success-rate gate: pause the run. The triggering
    /// `wave_gated` event is recorded separately by the caller through
    /// [`Self::record`], so this only flips status and persists.
    pub fn run_gated(&self, run: &mut BatchRun) {
        run.mark_paused();
        if let Err(err) = self.store.persist(run) {
            tracing::error!(run_id = %run.id, error = %err, "failed to persist paused run state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{RunId, RunMode, SystemClock};
    use tempfile::tempdir;

    #[test]
    fn record_recounts_and_persists() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path(), SystemClock);
        let mut run = BatchRun::new(RunId::new("run-1"), RunMode::Mock, 1, 1, 1, Utc::now());
        let tracker = ProgressTracker::new(&store);

        tracker.run_started(&mut run, Utc::now());
        assert_eq!(run.timeline.len(), 1);

        let reloaded = store.read_run_state("run-1").expect("read").expect("present");
        assert_eq!(reloaded.timeline.len(), 1);
    }

    #[test]
    fn run_completed_sets_status_and_timestamp() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path(), SystemClock);
        let mut run = BatchRun::new(RunId::new("run-1"), RunMode::Mock, 1, 1, 1, Utc::now());
        let tracker = ProgressTracker::new(&store);

        let now = Utc::now();
        tracker.run_completed(&mut run, now);
        assert_eq!(run.status, rf_core::RunStatus::Completed);
        assert_eq!(run.completed_at, Some(now));
    }

    #[test]
    fn run_gated_pauses_and_persists() {
        let dir = tempdir().expect("tempdir");
        let store = StateStore::new(dir.path(), SystemClock);
        let mut run = BatchRun::new(RunId::new("run-1"), RunMode::Mock, 20, 10, 3, Utc::now());
        let tracker = ProgressTracker::new(&store);

        tracker.run_gated(&mut run);
        assert_eq!(run.status, rf_core::RunStatus::Paused);

        let reloaded = store.read_run_state("run-1").expect("read").expect("present");
        assert_eq!(reloaded.status, rf_core::RunStatus::Paused);
    }
}
