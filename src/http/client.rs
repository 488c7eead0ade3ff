//! HTTP control client (C6): typed calls against the server's session API.
//!
//! Shaped after `RunnerClient`'s wrap-a-request-helper pattern and
//! `OctoClient`'s bearer-auth/get-post helpers: a private [`request`]
//! builds and sends, public methods stay thin and typed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::session::{AgentCatalogEntry, SessionCatalogEntry};

const WAIT_READY_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_WAIT_READY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize)]
struct CreateSessionRequest<'a> {
    agent: &'a str,
    runner: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    pub id: String,
    pub runner: String,
    #[serde(default)]
    pub launch: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Typed HTTP client for the five endpoints consumed by the CLIs (§6.2).
pub struct HttpClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => builder.bearer_auth(t),
            None => builder,
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, HttpError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| body.trim().to_string());
        Err(HttpError::Status {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentCatalogEntry>, HttpError> {
        let resp = self
            .authorize(self.client.get(self.url("/api/agents")))
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        let agents: Vec<AgentCatalogEntry> = resp
            .json()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(agents
            .into_iter()
            .filter(|a| !a.id.is_empty() && !a.name.is_empty())
            .collect())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionCatalogEntry>, HttpError> {
        let resp = self
            .authorize(self.client.get(self.url("/api/sessions")))
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))
    }

    pub async fn create_session(
        &self,
        agent: &str,
        runner: &str,
    ) -> Result<CreateSessionResponse, HttpError> {
        let resp = self
            .authorize(self.client.post(self.url("/api/sessions")))
            .json(&CreateSessionRequest { agent, runner })
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))
    }

    pub async fn send_input(&self, session_id: &str, bytes: Vec<u8>) -> Result<(), HttpError> {
        let path = format!("/api/sessions/{}/input", urlencode(session_id));
        let resp = self
            .authorize(self.client.post(self.url(&path)))
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// Polls `GET /api/sessions` until `session_id` appears or `timeout`
    /// (default 2s) elapses.
    pub async fn wait_ready(
        &self,
        session_id: &str,
        timeout: Option<Duration>,
    ) -> Result<(), HttpError> {
        let deadline = tokio::time::Instant::now() + timeout.unwrap_or(DEFAULT_WAIT_READY_TIMEOUT);
        loop {
            let sessions = self.list_sessions().await?;
            if sessions.iter().any(|s| s.id == session_id) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HttpError::WaitReadyTimeout(session_id.to_string()));
            }
            tokio::time::sleep(WAIT_READY_POLL_INTERVAL).await;
        }
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let client = HttpClient::new("http://localhost:8080/", None, Duration::from_secs(1));
        assert_eq!(client.url("/api/agents"), "http://localhost:8080/api/agents");
    }

    #[test]
    fn urlencode_escapes_spaces() {
        assert_eq!(urlencode("Fixer 1"), "Fixer%201");
    }

    #[test]
    fn debug_redacts_token() {
        let client = HttpClient::new("http://x", Some("secret".into()), Duration::from_secs(1));
        let printed = format!("{client:?}");
        assert!(!printed.contains("secret"));
    }
}
