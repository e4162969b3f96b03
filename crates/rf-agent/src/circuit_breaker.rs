// SPDX-License-Identifier: MIT

//! Explicit three-state circuit breaker: `closed -> open -> half_open ->
//! closed`. Hand-rolled rather than pulled from a crate since the state
//! transitions are few and the hardened client needs to inspect them
//! directly (for the distinguishable `CircuitBreakerOpen` error).

use parking_lot::Mutex;
use rf_core::Clock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at_ms: Option<i64>,
}

/// Configuration for the breaker. Defaults match the hardened client's
/// binding contract: five consecutive failures opens the breaker, 30s
/// cooldown before a half-open probe.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

pub struct CircuitBreaker<C: Clock> {
    config: CircuitBreakerConfig,
    clock: C,
    inner: Mutex<Inner>,
}

/// Outcome of asking the breaker for permission to proceed. `Probe` means
/// the caller is the single half-open probe request and must report its
/// result via `on_success`/`on_failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Probe,
    Rejected,
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn new(clock: C, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at_ms: None,
            }),
        }
    }

    pub fn admit(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => Admission::Allowed,
            State::HalfOpen => Admission::Rejected,
            State::Open => {
                let opened_at = inner.opened_at_ms.unwrap_or(0);
                let elapsed_ms = self.clock.epoch_ms() as i64 - opened_at;
                if elapsed_ms >= self.config.cooldown.as_millis() as i64 {
                    inner.state = State::HalfOpen;
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at_ms = None;
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at_ms = Some(self.clock.epoch_ms() as i64);
            }
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = State::Open;
                    inner.opened_at_ms = Some(self.clock.epoch_ms() as i64);
                }
            }
            State::Open => {}
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.inner.lock().state,
            State::Open
        )
    }
}
