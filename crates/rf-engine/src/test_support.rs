// SPDX-License-Identifier: MIT

//! Shared helper for driving a [`rf_core::FakeClock`] alongside a future
//! under `#[tokio::test(start_paused = true)]`. `SimulatedAgentBackend`
//! derives session stage purely from elapsed `Clock` time, but the
//! scheduler's poll loop waits on real `tokio::time::sleep` between
//! rounds — under paused time those sleeps resolve instantly without ever
//! advancing the `FakeClock`, so something has to nudge it forward in
//! lockstep with the runtime's virtual clock or the awaited future never
//! observes elapsed time and polls forever.

use rf_core::{Clock, FakeClock};
use std::time::Duration;

/// Races `fut` against a ticker that advances `clock` by `tick` every
/// `tick` of (paused, so effectively free) tokio time. Keeping the ticker
/// step equal to its own sleep duration keeps `clock` within one tick of
/// the runtime's virtual clock, so stage/timeout thresholds are crossed
/// without overshoot.
pub(crate) async fn drive_fake_clock<F: std::future::Future>(clock: FakeClock, tick: Duration, fut: F) -> F::Output {
    let step = chrono::Duration::from_std(tick).expect("tick fits in chrono::Duration");
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            output = &mut fut => return output,
            _ = tokio::time::sleep(tick) => {
                clock.advance(step);
            }
        }
    }
}
