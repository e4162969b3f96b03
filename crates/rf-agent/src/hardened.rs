// SPDX-License-Identifier: MIT

//! Wraps an [`AgentBackend`] with retry, jittered exponential backoff,
//! `Retry-After` honoring, and a circuit breaker. Every suspension point —
//! the request itself and any back-off sleep — observes cancellation.

use crate::backend::{
    AgentBackend, AgentBackendError, CreateSessionRequest, CreateSessionResponse,
    PlaybookSummary, SessionSnapshot,
};
use crate::circuit_breaker::{Admission, CircuitBreaker, CircuitBreakerConfig};
use async_trait::async_trait;
use rand::Rng as _;
use rf_core::Clock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const RETRYABLE_STATUSES: [u16; 4] = [429, 500, 502, 503];

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_secs: f64,
    pub jitter_max_secs: f64,
    pub retry_after_cap_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_secs: 1.0,
            jitter_max_secs: 1.0,
            retry_after_cap_secs: 60,
        }
    }
}

pub struct HardenedClient<B: AgentBackend, C: Clock> {
    backend: B,
    clock: C,
    retry: RetryConfig,
    breaker: CircuitBreaker<C>,
}

impl<B: AgentBackend, C: Clock> HardenedClient<B, C> {
    pub fn new(backend: B, clock: C, retry: RetryConfig, breaker_config: CircuitBreakerConfig) -> Self {
        let breaker = CircuitBreaker::new(clock.clone(), breaker_config);
        Self {
            backend,
            clock,
            retry,
            breaker,
        }
    }

    fn backoff_for_attempt(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        if let Some(retry_after) = retry_after_secs {
            return Duration::from_secs(retry_after.min(self.retry.retry_after_cap_secs));
        }
        let computed = self.retry.base_secs * 2f64.powi(attempt as i32 - 1);
        let jitter = rand::rng().random_range(0.0..=self.retry.jitter_max_secs.max(0.0));
        Duration::from_secs_f64(computed + jitter)
    }

    /// Run `call` under the breaker and retry policy. `call` is invoked
    /// fresh on every attempt since each issues its own network request.
    async fn execute<T, F, Fut>(
        &self,
        cancellation: &CancellationToken,
        mut call: F,
    ) -> Result<T, AgentBackendError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, AgentBackendError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let admission = self.breaker.admit();
            if admission == Admission::Rejected {
                return Err(AgentBackendError::CircuitBreakerOpen);
            }

            let result = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    return Err(AgentBackendError::Transport("request cancelled".into()));
                }
                result = call() => result,
            };

            match result {
                Ok(value) => {
                    self.breaker.on_success();
                    return Ok(value);
                }
                Err(err) => {
                    let is_retryable = matches!(
                        &err,
                        AgentBackendError::Http { status, .. } if RETRYABLE_STATUSES.contains(status)
                    );
                    self.breaker.on_failure();

                    if !is_retryable || attempt >= self.retry.max_attempts {
                        return Err(err);
                    }

                    let retry_after_secs = match &err {
                        AgentBackendError::Http { retry_after_secs, .. } => *retry_after_secs,
                        _ => None,
                    };
                    let delay = self.backoff_for_attempt(attempt, retry_after_secs);
                    tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => {
                            return Err(AgentBackendError::Transport("request cancelled during backoff".into()));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
        cancellation: &CancellationToken,
    ) -> Result<CreateSessionResponse, AgentBackendError> {
        self.execute(cancellation, || self.backend.create_session(request.clone()))
            .await
    }

    pub async fn get_session(
        &self,
        session_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<SessionSnapshot, AgentBackendError> {
        self.execute(cancellation, || self.backend.get_session(session_id))
            .await
    }

    pub async fn terminate_session(
        &self,
        session_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<(), AgentBackendError> {
        self.execute(cancellation, || self.backend.terminate_session(session_id))
            .await
    }

    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        cancellation: &CancellationToken,
    ) -> Result<(), AgentBackendError> {
        self.execute(cancellation, || self.backend.send_message(session_id, text))
            .await
    }

    pub async fn create_playbook(
        &self,
        title: &str,
        body: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, AgentBackendError> {
        self.execute(cancellation, || self.backend.create_playbook(title, body))
            .await
    }

    pub async fn list_playbooks(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Vec<PlaybookSummary>, AgentBackendError> {
        self.execute(cancellation, || self.backend.list_playbooks()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rf_core::FakeClock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedBackend {
        responses: Mutex<Vec<Result<CreateSessionResponse, AgentBackendError>>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl AgentBackend for ScriptedBackend {
        async fn create_session(
            &self,
            _request: CreateSessionRequest,
        ) -> Result<CreateSessionResponse, AgentBackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("scripted backend lock poisoned")
                .remove(0)
        }

        async fn get_session(&self, _session_id: &str) -> Result<SessionSnapshot, AgentBackendError> {
            unimplemented!()
        }

        async fn list_sessions(
            &self,
            _tags: &[String],
            _limit: u32,
            _offset: u32,
        ) -> Result<Vec<String>, AgentBackendError> {
            unimplemented!()
        }

        async fn send_message(&self, _session_id: &str, _text: &str) -> Result<(), AgentBackendError> {
            unimplemented!()
        }

        async fn terminate_session(&self, _session_id: &str) -> Result<(), AgentBackendError> {
            unimplemented!()
        }

        async fn create_playbook(&self, _title: &str, _body: &str) -> Result<String, AgentBackendError> {
            unimplemented!()
        }

        async fn list_playbooks(&self) -> Result<Vec<PlaybookSummary>, AgentBackendError> {
            unimplemented!()
        }
    }

    fn request() -> CreateSessionRequest {
        CreateSessionRequest {
            prompt: "fix it".to_string(),
            playbook_id: None,
            tags: vec![],
            structured_output_schema: None,
            max_acu_limit: 5,
            idempotent: true,
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let backend = ScriptedBackend {
            responses: Mutex::new(vec![
                Err(AgentBackendError::Http {
                    status: 503,
                    body: "unavailable".into(),
                    retry_after_secs: None,
                }),
                Ok(CreateSessionResponse {
                    session_id: "sess-1".into(),
                    url: "https://backend/sessions/sess-1".into(),
                    is_new: true,
                }),
            ]),
            calls: AtomicU32::new(0),
        };
        let client = HardenedClient::new(
            backend,
            FakeClock::new(chrono::Utc::now()),
            RetryConfig {
                base_secs: 0.0,
                jitter_max_secs: 0.0,
                ..Default::default()
            },
            CircuitBreakerConfig::default(),
        );

        let result = client
            .create_session(request(), &CancellationToken::new())
            .await
            .expect("should succeed after one retry");
        assert_eq!(result.session_id, "sess-1");
        assert_eq!(client.backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_status_fails_immediately() {
        let backend = ScriptedBackend {
            responses: Mutex::new(vec![Err(AgentBackendError::Http {
                status: 401,
                body: "unauthorized".into(),
                retry_after_secs: None,
            })]),
            calls: AtomicU32::new(0),
        };
        let client = HardenedClient::new(
            backend,
            FakeClock::new(chrono::Utc::now()),
            RetryConfig::default(),
            CircuitBreakerConfig::default(),
        );

        let err = client
            .create_session(request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentBackendError::Http { status: 401, .. }));
        assert_eq!(client.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn breaker_opens_after_consecutive_failures_and_fails_fast() {
        let mut responses = Vec::new();
        for _ in 0..5 {
            responses.push(Err(AgentBackendError::Http {
                status: 503,
                body: "unavailable".into(),
                retry_after_secs: None,
            }));
        }
        let backend = ScriptedBackend {
            responses: Mutex::new(responses),
            calls: AtomicU32::new(0),
        };
        let client = HardenedClient::new(
            backend,
            FakeClock::new(chrono::Utc::now()),
            RetryConfig {
                max_attempts: 1,
                base_secs: 0.0,
                jitter_max_secs: 0.0,
                ..Default::default()
            },
            CircuitBreakerConfig {
                failure_threshold: 5,
                cooldown: Duration::from_secs(30),
            },
        );

        for _ in 0..5 {
            let _ = client.create_session(request(), &CancellationToken::new()).await;
        }
        let err = client
            .create_session(request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentBackendError::CircuitBreakerOpen));
        assert_eq!(client.backend.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cancellation_is_observed_immediately() {
        let backend = ScriptedBackend {
            responses: Mutex::new(vec![Ok(CreateSessionResponse {
                session_id: "sess-1".into(),
                url: "https://backend/sessions/sess-1".into(),
                is_new: true,
            })]),
            calls: AtomicU32::new(0),
        };
        let client = HardenedClient::new(
            backend,
            FakeClock::new(chrono::Utc::now()),
            RetryConfig::default(),
            CircuitBreakerConfig::default(),
        );
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let err = client.create_session(request(), &cancellation).await.unwrap_err();
        assert!(matches!(err, AgentBackendError::Transport(_)));
    }
}
