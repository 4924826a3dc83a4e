//! Local LLM endpoint access.
//!
//! The summarizer only needs two capabilities from the model server: listing
//! the models it serves and a blocking prompt-in, text-out completion. Failed
//! calls are never retried here; callers decide whether a failure is fatal.

mod ollama;

pub use ollama::OllamaClient;

use crate::error::{ConfigurationError, LlmError};
use async_trait::async_trait;
use tracing::info;

/// Trait for text-generation backends.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Human-readable endpoint description for logs and errors.
    fn endpoint(&self) -> String;

    /// List the identifiers of the models the endpoint serves.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    /// Run one completion. Returns the trimmed, non-empty response text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Decide which model summarizes this run.
///
/// A configured model must be served by the endpoint. Without one, a single
/// served model is used directly; otherwise `choose` picks from the list.
pub async fn resolve_model<F>(
    client: &dyn LlmClient,
    configured: Option<&str>,
    choose: F,
) -> Result<String, ConfigurationError>
where
    F: FnOnce(&[String]) -> Option<String>,
{
    let models = client
        .list_models()
        .await
        .map_err(|e| ConfigurationError::LlmUnreachable {
            endpoint: client.endpoint(),
            reason: e.to_string(),
        })?;

    if models.is_empty() {
        return Err(ConfigurationError::NoLlmModels(client.endpoint()));
    }
    info!("Endpoint serves {} model(s)", models.len());

    match configured {
        Some(model) if models.iter().any(|m| m == model) => Ok(model.to_string()),
        Some(model) => Err(ConfigurationError::UnknownLlmModel {
            model: model.to_string(),
            available: models.join(", "),
        }),
        None if models.len() == 1 => Ok(models[0].clone()),
        None => choose(&models)
            .filter(|m| models.contains(m))
            .ok_or_else(|| ConfigurationError::Invalid("No LLM model selected".to_string())),
    }
}
