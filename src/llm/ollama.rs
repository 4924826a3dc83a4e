//! Ollama HTTP API client.

use super::LlmClient;
use crate::config::Settings;
use crate::error::{ConfigurationError, LlmError};
use crate::http::{create_client_with_timeout, PROBE_TIMEOUT_SECS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Client for an Ollama-compatible `/api/tags` + `/api/generate` server.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ConfigurationError> {
        Ok(Self {
            http: create_client_with_timeout(timeout)?,
            base_url,
        })
    }

    /// Build a client for the `[llm]` section of the settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        Self::new(
            settings.llm_base_url()?,
            Duration::from_secs(settings.llm.timeout_seconds),
        )
    }

    fn url(&self, path: &str) -> Result<Url, LlmError> {
        self.base_url
            .join(path)
            .map_err(|e| LlmError::Malformed(format!("bad endpoint path {path}: {e}")))
    }
}

/// Reject non-2xx responses, keeping the body for the error message.
async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(LlmError::Status { status, body })
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn endpoint(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let resp = self
            .http
            .get(self.url("api/tags")?)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to list models"))?;

        let body = ensure_success(resp).await?.text().await?;
        let tags: TagsResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Malformed(e.to_string()))?;

        Ok(tags.models.into_iter().filter_map(|m| m.name).collect())
    }

    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let resp = self
            .http
            .post(self.url("api/generate")?)
            .json(&request)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        let body = ensure_success(resp).await?.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Malformed(e.to_string()))?;

        let text = parsed.response.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!("Received {} characters", text.len());
        Ok(text.to_string())
    }
}
