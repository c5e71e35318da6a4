//! HTTP transport to the event service.
//!
//! Event windows are fetched with a POST describing the collection,
//! previous output is fetched with a GET, and results are POSTed back.
//! Responses wrap their payload in a `{"resource": ...}` envelope.
//! Network errors and 5xx responses are retried with exponential backoff.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use logdiff_core::{RunState, TransportConfig};
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Body of an event window request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    pub application_id: String,
    pub workflow_id: String,
    pub state_execution_id: String,
    pub service_id: String,
    pub log_collection_minute: i64,
    pub nodes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Query parameters identifying a previous run's output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrevStateQuery {
    pub application_id: String,
    pub state_execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub log_collection_minute: i64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    resource: Option<T>,
}

/// Delay before retry number `attempt` (0-based): doubles from `initial_ms`
/// and is capped at 30 seconds.
pub fn backoff_delay(initial_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.pow(attempt.min(5));
    Duration::from_millis(initial_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

pub struct Transport {
    http: reqwest::Client,
    auth_token: Option<String>,
    max_attempts: u32,
    initial_backoff_ms: u64,
}

impl Transport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            auth_token: config.auth_token.clone(),
            max_attempts: config.max_attempts.max(1),
            initial_backoff_ms: config.initial_backoff_ms,
        })
    }

    /// Raw event records of one window.
    pub async fn fetch_events(&self, url: &str, request: &LogRequest) -> Result<Vec<Value>> {
        let resp = self
            .send_with_retry(|| self.http.post(url).json(request))
            .await
            .with_context(|| format!("failed to fetch events from {url}"))?;

        let envelope: Envelope<Vec<Value>> = resp
            .json()
            .await
            .context("failed to parse events response")?;
        let events = envelope.resource.unwrap_or_default();
        debug!(url, events = events.len(), nodes = request.nodes.len(), "fetched events");
        Ok(events)
    }

    /// The previous run's output, if the service has one.
    pub async fn fetch_prev_state(
        &self,
        url: &str,
        query: &PrevStateQuery,
    ) -> Result<Option<RunState>> {
        let resp = self
            .send_with_retry(|| self.http.get(url).query(query))
            .await
            .with_context(|| format!("failed to fetch previous state from {url}"))?;

        let envelope: Envelope<RunState> = resp
            .json()
            .await
            .context("failed to parse previous state response")?;
        Ok(envelope.resource)
    }

    pub async fn post_results(&self, url: &str, state: &RunState) -> Result<()> {
        self.send_with_retry(|| self.http.post(url).json(state))
            .await
            .with_context(|| format!("failed to post results to {url}"))?;
        Ok(())
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let mut request = build();
            if let Some(token) = &self.auth_token {
                request = request.header(AUTHORIZATION, token);
            }

            let retryable = match request.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().is_server_error() => {
                    format!("server returned {}", resp.status())
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    bail!("server returned {}: {}", status, body);
                }
                Err(e) => e.to_string(),
            };

            attempt += 1;
            if attempt >= self.max_attempts {
                bail!("giving up after {} attempts: {}", attempt, retryable);
            }
            let delay = backoff_delay(self.initial_backoff_ms, attempt - 1);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %retryable,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
