//! Configuration settings for Referat.

use crate::error::{ConfigurationError, ReferatError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub transcription: TranscriptionSettings,
    pub summarization: SummarizationSettings,
    pub audio: AudioSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for temporary files (audio windows).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/referat".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Local LLM endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Host name or IP address of the LLM server.
    pub host: String,
    /// Port of the LLM server.
    pub port: u16,
    /// Model used for summarization. None = choose from the served models.
    pub model: Option<String>,
    /// Timeout for a single generate call.
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: None,
            timeout_seconds: 300,
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Preferred backend (local, hosted).
    pub backend: String,
    /// Model size tag (tiny, base, small, medium, large-v3, ...).
    pub model_size: String,
    pub local: LocalBackendSettings,
    pub hosted: HostedBackendSettings,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            model_size: "large-v3".to_string(),
            local: LocalBackendSettings::default(),
            hosted: HostedBackendSettings::default(),
        }
    }
}

/// Settings for the whisper.cpp backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBackendSettings {
    /// whisper.cpp CLI binary name or path.
    pub binary: String,
    /// Directory holding ggml model files.
    pub models_dir: String,
    /// Beam size passed to the decoder.
    pub beam_size: u32,
    /// Decoder threads. None = whisper.cpp default.
    pub threads: Option<u32>,
    /// Longest audio transcribed in a single pass.
    pub single_pass_ceiling_seconds: u32,
    /// Subtracted from the ceiling to get the window length.
    pub safety_margin_seconds: u32,
    /// Seconds shared by consecutive windows.
    pub window_overlap_seconds: u32,
}

impl Default for LocalBackendSettings {
    fn default() -> Self {
        Self {
            binary: "whisper-cli".to_string(),
            models_dir: "~/.referat/models".to_string(),
            beam_size: 5,
            threads: None,
            single_pass_ceiling_seconds: 1800, // 30 minutes
            safety_margin_seconds: 60,
            window_overlap_seconds: 10,
        }
    }
}

/// Settings for the hosted ASR pipeline backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostedBackendSettings {
    /// Base URL of the ASR server (without /v1).
    pub base_url: String,
    /// Bearer token, if the server requires one.
    pub api_key: Option<String>,
    /// Prefix joined with the model size to form the model id.
    pub model_prefix: String,
    /// Sliding window length used by the server.
    pub chunk_length_seconds: u32,
    /// Context kept on each side of a window.
    pub stride_length_seconds: u32,
    /// Timeout for one transcription request.
    pub timeout_seconds: u64,
}

impl Default for HostedBackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_key: None,
            model_prefix: "openai/whisper-".to_string(),
            chunk_length_seconds: 30,
            stride_length_seconds: 5,
            timeout_seconds: 3600,
        }
    }
}

/// Transcript chunking settings for map-reduce summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationSettings {
    /// Token budget per chunk.
    pub max_tokens: usize,
    /// Tokens shared by consecutive chunks.
    pub overlap_tokens: usize,
}

impl Default for SummarizationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            overlap_tokens: 200,
        }
    }
}

/// Audio extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// ffmpeg executable.
    pub ffmpeg: String,
    /// ffprobe executable.
    pub ffprobe: String,
    /// ffmpeg audio encoder.
    pub codec: String,
    /// Target bitrate.
    pub bitrate: String,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            codec: "libmp3lame".to_string(),
            bitrate: "192k".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReferatError::from(ConfigurationError::Invalid(e.to_string())))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("referat")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded whisper.cpp models directory.
    pub fn models_dir(&self) -> PathBuf {
        Self::expand_path(&self.transcription.local.models_dir)
    }

    /// Base URL of the LLM endpoint, e.g. `http://127.0.0.1:11434/`.
    ///
    /// `llm.port` only applies when `llm.host` does not carry a port itself.
    pub fn llm_base_url(&self) -> std::result::Result<url::Url, ConfigurationError> {
        let host = self.llm.host.trim();
        let raw = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };
        let invalid = |reason: String| ConfigurationError::InvalidEndpoint(format!("{raw}: {reason}"));

        let mut url = url::Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
        if !has_explicit_port(&raw) {
            url.set_port(Some(self.llm.port))
                .map_err(|_| invalid("cannot carry a port".to_string()))?;
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

/// Whether the authority part of `raw` ends in `:<digits>`.
fn has_explicit_port(raw: &str) -> bool {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.summarization.max_tokens, 4096);
        assert_eq!(settings.transcription.local.single_pass_ceiling_seconds, 1800);
        assert_eq!(settings.transcription.hosted.chunk_length_seconds, 30);
        assert_eq!(settings.transcription.hosted.stride_length_seconds, 5);
        assert_eq!(settings.llm.port, 11434);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [llm]
            host = "10.0.0.5"
            port = 8080

            [transcription.local]
            window_overlap_seconds = 20
            "#,
        )
        .unwrap();

        assert_eq!(settings.llm.host, "10.0.0.5");
        assert_eq!(settings.llm.port, 8080);
        assert_eq!(settings.llm.timeout_seconds, 300);
        assert_eq!(settings.transcription.local.window_overlap_seconds, 20);
        assert_eq!(settings.transcription.local.binary, "whisper-cli");
        assert_eq!(settings.transcription.backend, "local");
    }

    #[test]
    fn test_llm_base_url() {
        let mut settings = Settings::default();
        settings.llm.host = "172.180.9.187".to_string();
        settings.llm.port = 8080;
        assert_eq!(
            settings.llm_base_url().unwrap().as_str(),
            "http://172.180.9.187:8080/"
        );

        settings.llm.host = "https://llm.internal".to_string();
        settings.llm.port = 443;
        assert_eq!(settings.llm_base_url().unwrap().as_str(), "https://llm.internal/");
    }

    #[test]
    fn test_llm_base_url_keeps_port_in_host() {
        let mut settings = Settings::default();
        settings.llm.host = "https://h:8443".to_string();
        assert_eq!(settings.llm_base_url().unwrap().as_str(), "https://h:8443/");

        settings.llm.host = "10.0.0.5:8080".to_string();
        assert_eq!(settings.llm_base_url().unwrap().as_str(), "http://10.0.0.5:8080/");

        settings.llm.host = "http://[::1]:9000/ollama".to_string();
        assert_eq!(settings.llm_base_url().unwrap().as_str(), "http://[::1]:9000/ollama/");

        settings.llm.host = "http://[::1]".to_string();
        assert_eq!(settings.llm_base_url().unwrap().as_str(), "http://[::1]:11434/");
    }

    #[test]
    fn test_llm_base_url_rejects_garbage() {
        let mut settings = Settings::default();
        settings.llm.host = "bad host name".to_string();
        assert!(matches!(
            settings.llm_base_url(),
            Err(ConfigurationError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.llm.model = Some("llama3:8b".to_string());
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.llm.model.as_deref(), Some("llama3:8b"));
    }
}
