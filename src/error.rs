//! Error types for Referat.
//!
//! Errors are split by pipeline stage. Configuration errors abort a run before
//! any job starts; extraction, transcription, summarization and persistence
//! errors are per-job and are turned into skip records by the orchestrator.

use std::path::PathBuf;
use thiserror::Error;

/// Startup-time errors. Any of these terminates the run.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("No transcription backend is available (tried: {tried})")]
    NoBackendAvailable { tried: String },

    #[error("Chunk overlap ({overlap} tokens) must be smaller than the chunk size ({max} tokens)")]
    InvalidOverlap { max: usize, overlap: usize },

    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("LLM endpoint {endpoint} is unreachable: {reason}")]
    LlmUnreachable { endpoint: String, reason: String },

    #[error("LLM endpoint {0} reports no models")]
    NoLlmModels(String),

    #[error("LLM model '{model}' is not served by the endpoint (available: {available})")]
    UnknownLlmModel { model: String, available: String },

    #[error("Input folder not found: {0}")]
    InputFolderMissing(PathBuf),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Audio extraction failures for a single job.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolMissing(String),

    #[error("Audio decoding failed: {0}")]
    DecodeFailed(String),

    #[error("Could not determine audio duration: {0}")]
    ProbeFailed(String),

    #[error("IO error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

/// Speech-to-text failures.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Transcription backend '{backend}' is unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Transcription produced no text")]
    EmptyTranscript,

    #[error("Audio preparation failed: {0}")]
    Audio(#[from] ExtractionError),
}

/// A single failed call to the LLM endpoint.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Endpoint returned an empty response")]
    EmptyResponse,
}

/// Summarization failures for a single job.
#[derive(Error, Debug)]
pub enum SummarizationError {
    #[error("Could not generate any intermediate summaries ({chunks} chunks attempted)")]
    NoIntermediateSummaries { chunks: usize },

    #[error("Direct summarization call failed: {0}")]
    DirectCallFailed(LlmError),

    #[error("Combine summarization call failed: {0}")]
    CombineCallFailed(LlmError),

    #[error("Transcript is empty, nothing to summarize")]
    EmptyTranscript,
}

/// Failure to write an output artifact.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Library-level error type for Referat operations.
#[derive(Error, Debug)]
pub enum ReferatError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Summarization(#[from] SummarizationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for Referat operations.
pub type Result<T> = std::result::Result<T, ReferatError>;
