// SPDX-License-Identifier: MIT

//! The abstract agent-backend contract both the remote and simulated
//! implementations satisfy, and the hardened client wraps.

use async_trait::async_trait;
use rf_core::{BackendStatus, StructuredOutput};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentBackendError {
    #[error("backend request failed with status {status}: {body}")]
    Http {
        status: u16,
        body: String,
        retry_after_secs: Option<u64>,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("circuit breaker open")]
    CircuitBreakerOpen,
    #[error("session not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output_schema: Option<serde_json::Value>,
    pub max_acu_limit: u32,
    pub idempotent: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub url: String,
    pub is_new: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSnapshot {
    pub status: BackendStatus,
    #[serde(default)]
    pub structured_output: Option<StructuredOutput>,
    #[serde(default)]
    pub pull_request: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybookSummary {
    pub playbook_id: String,
    pub title: String,
}

/// Polymorphic contract for the remote agent platform. `create_session` is
/// always invoked with `idempotent: true`; both implementations must expose
/// identical semantics to the caller.
#[async_trait]
pub trait AgentBackend: Send + Sync + 'static {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, AgentBackendError>;

    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, AgentBackendError>;

    async fn list_sessions(
        &self,
        tags: &[String],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<String>, AgentBackendError>;

    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), AgentBackendError>;

    async fn terminate_session(&self, session_id: &str) -> Result<(), AgentBackendError>;

    async fn create_playbook(
        &self,
        title: &str,
        body: &str,
    ) -> Result<String, AgentBackendError>;

    async fn list_playbooks(&self) -> Result<Vec<PlaybookSummary>, AgentBackendError>;
}
