// SPDX-License-Identifier: MIT

//! HTTP+Bearer implementation of [`AgentBackend`] speaking the remote
//! platform's wire protocol.

use crate::backend::{
    AgentBackend, AgentBackendError, CreateSessionRequest, CreateSessionResponse,
    PlaybookSummary, SessionSnapshot,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

pub struct RemoteAgentBackend {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl RemoteAgentBackend {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .use_rustls_tls()
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AgentBackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        Err(AgentBackendError::Http {
            status,
            body,
            retry_after_secs,
        })
    }
}

#[async_trait]
impl AgentBackend for RemoteAgentBackend {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, AgentBackendError> {
        let response = self
            .client
            .post(self.url("/sessions"))
            .bearer_auth(&self.bearer_token)
            .json(&request)
            .send()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, AgentBackendError> {
        let response = self
            .client
            .get(self.url(&format!("/sessions/{session_id}")))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AgentBackendError::NotFound(session_id.to_string()));
        }
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))
    }

    async fn list_sessions(
        &self,
        tags: &[String],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<String>, AgentBackendError> {
        let response = self
            .client
            .get(self.url("/sessions"))
            .bearer_auth(&self.bearer_token)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
            .query(&tags.iter().map(|t| ("tags", t.clone())).collect::<Vec<_>>())
            .send()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))
    }

    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), AgentBackendError> {
        let response = self
            .client
            .post(self.url(&format!("/sessions/{session_id}/messages")))
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn terminate_session(&self, session_id: &str) -> Result<(), AgentBackendError> {
        let response = self
            .client
            .post(self.url(&format!("/sessions/{session_id}/terminate")))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn create_playbook(
        &self,
        title: &str,
        body: &str,
    ) -> Result<String, AgentBackendError> {
        let response = self
            .client
            .post(self.url("/playbooks"))
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "title": title, "body": body }))
            .send()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))?;
        let response = Self::check_status(response).await?;
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))?;
        value
            .get("playbook_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AgentBackendError::Transport("missing playbook_id in response".into()))
    }

    async fn list_playbooks(&self) -> Result<Vec<PlaybookSummary>, AgentBackendError> {
        let response = self
            .client
            .get(self.url("/playbooks"))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| AgentBackendError::Transport(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_session_sends_bearer_token_and_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .and(bearer_token("secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-1",
                "url": "https://backend/sessions/sess-1",
                "is_new": true
            })))
            .mount(&server)
            .await;

        let backend = RemoteAgentBackend::new(server.uri(), "secret-token");
        let response = backend
            .create_session(CreateSessionRequest {
                prompt: "fix it".to_string(),
                playbook_id: None,
                tags: vec![],
                structured_output_schema: None,
                max_acu_limit: 5,
                idempotent: true,
            })
            .await
            .expect("create_session");

        assert_eq!(response.session_id, "sess-1");
        assert!(response.is_new);
    }

    #[tokio::test]
    async fn get_session_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let backend = RemoteAgentBackend::new(server.uri(), "secret-token");
        let err = backend.get_session("missing").await.unwrap_err();
        assert!(matches!(err, AgentBackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn non_2xx_status_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let backend = RemoteAgentBackend::new(server.uri(), "secret-token");
        let err = backend
            .create_session(CreateSessionRequest {
                prompt: "fix it".to_string(),
                playbook_id: None,
                tags: vec![],
                structured_output_schema: None,
                max_acu_limit: 5,
                idempotent: true,
            })
            .await
            .unwrap_err();
        match err {
            AgentBackendError::Http { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }
}
