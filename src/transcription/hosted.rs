//! Hosted ASR pipeline backend.
//!
//! Talks to an OpenAI-compatible transcription server that runs a chunked
//! speech-recognition pipeline. The server applies its own sliding window, so
//! the whole audio file goes up in one request.

use super::{BackendChoice, TranscriptResult, TranscriptionBackend};
use crate::audio::AudioArtifact;
use crate::config::Settings;
use crate::error::{ConfigurationError, ExtractionError, TranscriptionError};
use crate::http::{create_client_with_timeout, PROBE_TIMEOUT_SECS};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Backend for a remote `/v1/audio/transcriptions` pipeline.
pub struct HostedPipelineBackend {
    http: reqwest::Client,
    base_url: Url,
    model_id: String,
    api_key: Option<String>,
    chunk_length_seconds: u32,
    stride_length_seconds: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HostedPipelineBackend {
    pub fn new(settings: &Settings) -> Result<Self, ConfigurationError> {
        let hosted = &settings.transcription.hosted;

        let mut raw = hosted.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url =
            Url::parse(&raw).map_err(|_| ConfigurationError::InvalidEndpoint(hosted.base_url.clone()))?;

        Ok(Self {
            http: create_client_with_timeout(Duration::from_secs(hosted.timeout_seconds))?,
            base_url,
            model_id: format!("{}{}", hosted.model_prefix, settings.transcription.model_size),
            api_key: hosted.api_key.clone().filter(|k| !k.trim().is_empty()),
            chunk_length_seconds: hosted.chunk_length_seconds,
            stride_length_seconds: hosted.stride_length_seconds,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn url(&self, path: &str) -> Result<Url, TranscriptionError> {
        self.base_url
            .join(path)
            .map_err(|e| TranscriptionError::InferenceFailed(format!("bad endpoint path {path}: {e}")))
    }

    fn unavailable(&self, reason: impl Into<String>) -> TranscriptionError {
        TranscriptionError::BackendUnavailable {
            backend: self.name(),
            reason: reason.into(),
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key.trim()),
            None => req,
        }
    }

    /// List the model ids the server advertises.
    pub async fn list_models(&self) -> Result<Vec<String>, TranscriptionError> {
        let req = self
            .http
            .get(self.url("v1/models")?)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS));

        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| self.unavailable(format!("{} is unreachable: {e}", self.base_url)))?;

        if !resp.status().is_success() {
            return Err(self.unavailable(format!("model listing returned {}", resp.status())));
        }

        let list: ModelList = resp
            .json()
            .await
            .map_err(|e| self.unavailable(format!("malformed model listing: {e}")))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

fn mime_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        _ => "audio/mpeg",
    }
}

#[async_trait]
impl TranscriptionBackend for HostedPipelineBackend {
    fn choice(&self) -> BackendChoice {
        BackendChoice::Hosted
    }

    fn name(&self) -> String {
        format!("hosted pipeline ({})", self.model_id)
    }

    async fn check_available(&self) -> Result<(), TranscriptionError> {
        let models = self.list_models().await?;
        if models.iter().any(|m| m == &self.model_id) {
            Ok(())
        } else {
            Err(self.unavailable(format!(
                "model {} is not served (available: {})",
                self.model_id,
                models.join(", ")
            )))
        }
    }

    #[instrument(skip_all, fields(audio = %audio.path.display()))]
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<TranscriptResult, TranscriptionError> {
        let bytes = tokio::fs::read(&audio.path)
            .await
            .map_err(ExtractionError::from)?;
        debug!("Uploading {} bytes", bytes.len());

        let file_name = audio
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(&audio.path))
            .map_err(|e| TranscriptionError::InferenceFailed(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.model_id.clone())
            .text("chunk_length_s", self.chunk_length_seconds.to_string())
            .text("stride_length_s", self.stride_length_seconds.to_string());

        let req = self
            .http
            .post(self.url("v1/audio/transcriptions")?)
            .multipart(form);

        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| TranscriptionError::InferenceFailed(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TranscriptionError::InferenceFailed(format!(
                "server returned {status}: {}",
                body.trim()
            )));
        }

        let parsed: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| TranscriptionError::InferenceFailed(format!("malformed response: {e}")))?;

        TranscriptResult::new(parsed.text, 1)
    }
}
