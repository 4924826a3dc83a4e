//! Configuration module for Referat.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, SummaryPrompts, SUMMARY_PROMPT_VERSION};
pub use settings::{
    AudioSettings, GeneralSettings, HostedBackendSettings, LlmSettings, LocalBackendSettings,
    PromptSettings, Settings, SummarizationSettings, TranscriptionSettings,
};
