// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-agent: the abstract agent-backend contract (C2), its remote and
//! simulated implementations, and the hardened client (C3) that wraps
//! either one with retry, backoff, and a circuit breaker.

pub mod backend;
pub mod circuit_breaker;
pub mod hardened;
pub mod remote;
pub mod simulated;

pub use backend::{
    AgentBackend, AgentBackendError, CreateSessionRequest, CreateSessionResponse,
    PlaybookSummary, SessionSnapshot,
};
pub use circuit_breaker::{Admission, CircuitBreaker, CircuitBreakerConfig};
pub use hardened::{HardenedClient, RetryConfig};
pub use remote::RemoteAgentBackend;
pub use simulated::SimulatedAgentBackend;
