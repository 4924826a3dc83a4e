//! Speech-to-text backends.
//!
//! Two interchangeable strategies produce a plain transcript from an extracted
//! audio file:
//!
//! - **Local**: a whisper.cpp binary running on this machine. Recordings
//!   longer than the single-pass ceiling are split into overlapping windows.
//! - **Hosted**: an ASR pipeline server that performs its own chunked
//!   inference and returns one concatenated transcript.
//!
//! The [`BackendSelector`] picks one of them once per run.

mod device;
mod hosted;
mod local;
mod selector;

pub use device::{ComputeDevice, Precision};
pub use hosted::HostedPipelineBackend;
pub use local::LocalModelBackend;
pub use selector::{ActiveBackend, BackendSelector, BACKEND_PRIORITY};

use crate::audio::AudioArtifact;
use crate::error::{ConfigurationError, TranscriptionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The transcription strategies a run can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    Local,
    Hosted,
}

impl BackendChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendChoice::Local => "local",
            BackendChoice::Hosted => "hosted",
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendChoice {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "faster-whisper" | "whisper.cpp" | "turbo" | "2" => Ok(BackendChoice::Local),
            "hosted" | "pipeline" | "huggingface" | "1" => Ok(BackendChoice::Hosted),
            other => Err(ConfigurationError::Invalid(format!(
                "Unknown transcription backend '{other}' (expected 'local' or 'hosted')"
            ))),
        }
    }
}

/// The text of one finished transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptResult {
    pub text: String,
    /// Number of audio windows transcribed to produce `text`.
    pub windows: usize,
}

impl TranscriptResult {
    /// Wrap backend output. Blank text is an error, never a result.
    pub fn new(text: impl Into<String>, windows: usize) -> Result<Self, TranscriptionError> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }
        Ok(Self {
            text,
            windows: windows.max(1),
        })
    }

    /// Whether the text was stitched together from several windows.
    pub fn is_assembled(&self) -> bool {
        self.windows > 1
    }
}

/// Trait for speech-to-text strategies.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    fn choice(&self) -> BackendChoice;

    /// Display name including the model in use.
    fn name(&self) -> String;

    /// Check that the model and runtime this backend needs are present.
    async fn check_available(&self) -> Result<(), TranscriptionError>;

    /// Transcribe the whole artifact into a single text.
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<TranscriptResult, TranscriptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_choice_parsing() {
        for s in ["local", "LOCAL", "faster-whisper", "turbo", "2", " local "] {
            assert_eq!(s.parse::<BackendChoice>().unwrap(), BackendChoice::Local, "{s}");
        }
        for s in ["hosted", "pipeline", "HuggingFace", "1"] {
            assert_eq!(s.parse::<BackendChoice>().unwrap(), BackendChoice::Hosted, "{s}");
        }
        assert!("3".parse::<BackendChoice>().is_err());
        assert!("".parse::<BackendChoice>().is_err());
    }

    #[test]
    fn test_backend_choice_display_roundtrips() {
        for choice in BACKEND_PRIORITY {
            assert_eq!(choice.to_string().parse::<BackendChoice>().unwrap(), choice);
        }
    }

    #[test]
    fn test_transcript_result_rejects_blank_text() {
        assert!(matches!(
            TranscriptResult::new("  \n\t", 1),
            Err(TranscriptionError::EmptyTranscript)
        ));
    }

    #[test]
    fn test_transcript_result_assembly() {
        let single = TranscriptResult::new(" hello ", 1).unwrap();
        assert_eq!(single.text, "hello");
        assert!(!single.is_assembled());

        let stitched = TranscriptResult::new("a b c", 3).unwrap();
        assert!(stitched.is_assembled());
    }
}
