//! Models command implementation.

use crate::cli::{LlmArgs, Output};
use crate::config::Settings;
use crate::llm::{LlmClient, OllamaClient};
use anyhow::Result;

/// List the models served by the configured LLM endpoint.
pub async fn run_models(args: &LlmArgs, mut settings: Settings) -> Result<()> {
    args.apply_to(&mut settings);
    let client = OllamaClient::from_settings(&settings)?;

    let spinner = Output::spinner(&format!("Querying {}...", client.endpoint()));
    let models = client.list_models().await;
    spinner.finish_and_clear();

    let models = models.map_err(|e| {
        anyhow::anyhow!("LLM endpoint {} is unreachable: {}", client.endpoint(), e)
    })?;

    Output::header(&format!("Models at {}", client.endpoint()));
    if models.is_empty() {
        Output::warning("The endpoint reports no models. Pull one first, e.g. `ollama pull llama3`.");
        return Ok(());
    }

    for model in &models {
        let marker = if settings.llm.model.as_deref() == Some(model.as_str()) {
            " (configured)"
        } else {
            ""
        };
        Output::list_item(&format!("{model}{marker}"));
    }
    Ok(())
}
