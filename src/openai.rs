//! Minimal client for an OpenAI-compatible HTTP API.
//!
//! The credential is passed in explicitly; nothing here reads or writes
//! process environment variables.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx → retry with exponential backoff
//! - HTTP 429 with `insufficient_quota` → fail immediately
//! - Other 4xx → fail immediately
//! - Network errors (including timeouts) → retry
//! - Backoff: 1s, 2s, 4s, ... capped at 32s

use std::time::Duration;

use crate::config::Config;
use crate::error::ApiError;

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    max_retries: u32,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_base", &self.api_base)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(
        api_base: &str,
        api_key: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            &config.api_base,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    /// Worst-case wall time of one [`post_json`](Self::post_json) call:
    /// every attempt runs into the request timeout and every backoff is
    /// slept in full.
    pub fn worst_case_duration(request_timeout: Duration, max_retries: u32) -> Duration {
        let backoff: Duration = (0..max_retries).map(retry_delay).sum();
        request_timeout * (max_retries + 1) + backoff
    }

    /// POST `body` to `{api_base}/{path}` and return the parsed JSON reply.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        let mut attempt = 0;
        loop {
            match self.send_once(&url, body).await {
                Ok(json) => return Ok(json),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = retry_delay(attempt);
                    tracing::warn!(
                        url = %url,
                        attempt = attempt + 1,
                        error = %e,
                        "retrying API request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Backoff before retry number `attempt + 1`: 1s, 2s, 4s ... capped at 32s.
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.min(5))
}
