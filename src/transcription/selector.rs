//! Once-per-run backend resolution with deterministic fallback.

use super::{
    BackendChoice, ComputeDevice, HostedPipelineBackend, LocalModelBackend, TranscriptionBackend,
};
use crate::config::Settings;
use crate::error::ConfigurationError;
use std::sync::Arc;
use tracing::{info, warn};

/// Fallback order when the preferred backend cannot be used.
pub const BACKEND_PRIORITY: [BackendChoice; 2] = [BackendChoice::Local, BackendChoice::Hosted];

/// The backend every job of a run uses.
#[derive(Clone)]
pub struct ActiveBackend {
    pub choice: BackendChoice,
    pub backend: Arc<dyn TranscriptionBackend>,
    /// Whether resolution had to move past the preferred backend.
    pub fell_back: bool,
}

impl std::fmt::Debug for ActiveBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveBackend")
            .field("choice", &self.choice)
            .field("backend", &self.backend.name())
            .field("fell_back", &self.fell_back)
            .finish()
    }
}

/// Holds the candidate backends and picks one of them.
pub struct BackendSelector {
    candidates: Vec<Arc<dyn TranscriptionBackend>>,
    /// Backends whose settings could not be turned into a backend.
    misconfigured: Vec<(BackendChoice, String)>,
}

impl BackendSelector {
    pub fn new(candidates: Vec<Arc<dyn TranscriptionBackend>>) -> Self {
        Self {
            candidates,
            misconfigured: Vec::new(),
        }
    }

    /// Record `choice` as unusable because of its configuration.
    pub fn with_misconfigured(mut self, choice: BackendChoice, reason: impl Into<String>) -> Self {
        self.misconfigured.push((choice, reason.into()));
        self
    }

    /// Construct every known backend from the settings.
    ///
    /// A backend whose settings are invalid is kept out of the candidates and
    /// reported by [`resolve`](Self::resolve) only if it is reached.
    pub async fn from_settings(settings: &Settings) -> Self {
        let device = ComputeDevice::detect().await;
        let mut selector = Self::new(Vec::new());

        match LocalModelBackend::new(settings, device) {
            Ok(local) => selector.candidates.push(Arc::new(local)),
            Err(e) => selector.misconfigured.push((BackendChoice::Local, e.to_string())),
        }
        match HostedPipelineBackend::new(settings) {
            Ok(hosted) => selector.candidates.push(Arc::new(hosted)),
            Err(e) => selector.misconfigured.push((BackendChoice::Hosted, e.to_string())),
        }

        selector
    }

    /// Order in which backends are tried for `preferred`.
    pub fn order(preferred: BackendChoice) -> Vec<BackendChoice> {
        std::iter::once(preferred)
            .chain(BACKEND_PRIORITY.into_iter().filter(|c| *c != preferred))
            .collect()
    }

    /// Resolve the backend for this run.
    ///
    /// Tries `preferred` first, then the rest of [`BACKEND_PRIORITY`] in order.
    pub async fn resolve(&self, preferred: BackendChoice) -> Result<ActiveBackend, ConfigurationError> {
        let mut rejected = Vec::new();

        for choice in Self::order(preferred) {
            let Some(backend) = self.candidates.iter().find(|b| b.choice() == choice) else {
                let reason = self
                    .misconfigured
                    .iter()
                    .find(|(c, _)| *c == choice)
                    .map(|(_, reason)| reason.as_str())
                    .unwrap_or("not configured");
                warn!("Backend {} rejected: {}", choice, reason);
                rejected.push(format!("{choice} ({reason})"));
                continue;
            };

            match backend.check_available().await {
                Ok(()) => {
                    let fell_back = choice != preferred;
                    if fell_back {
                        warn!("Falling back to {} backend: {}", choice, backend.name());
                    } else {
                        info!("Using {} backend: {}", choice, backend.name());
                    }
                    return Ok(ActiveBackend {
                        choice,
                        backend: Arc::clone(backend),
                        fell_back,
                    });
                }
                Err(e) => {
                    warn!("Backend {} rejected: {}", choice, e);
                    rejected.push(format!("{choice} ({e})"));
                }
            }
        }

        Err(ConfigurationError::NoBackendAvailable {
            tried: rejected.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioArtifact;
    use crate::error::TranscriptionError;
    use crate::transcription::TranscriptResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBackend {
        choice: BackendChoice,
        available: bool,
        probes: AtomicUsize,
    }

    impl StubBackend {
        fn new(choice: BackendChoice, available: bool) -> Arc<Self> {
            Arc::new(Self {
                choice,
                available,
                probes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TranscriptionBackend for StubBackend {
        fn choice(&self) -> BackendChoice {
            self.choice
        }

        fn name(&self) -> String {
            format!("stub-{}", self.choice)
        }

        async fn check_available(&self) -> Result<(), TranscriptionError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.available {
                Ok(())
            } else {
                Err(TranscriptionError::BackendUnavailable {
                    backend: self.name(),
                    reason: "weights missing".to_string(),
                })
            }
        }

        async fn transcribe(&self, _audio: &AudioArtifact) -> Result<TranscriptResult, TranscriptionError> {
            TranscriptResult::new("stub", 1)
        }
    }

    #[test]
    fn test_order_starts_with_preferred() {
        assert_eq!(
            BackendSelector::order(BackendChoice::Hosted),
            vec![BackendChoice::Hosted, BackendChoice::Local]
        );
        assert_eq!(
            BackendSelector::order(BackendChoice::Local),
            vec![BackendChoice::Local, BackendChoice::Hosted]
        );
    }

    #[tokio::test]
    async fn test_preferred_backend_used_when_available() {
        let local = StubBackend::new(BackendChoice::Local, true);
        let hosted = StubBackend::new(BackendChoice::Hosted, true);
        let selector = BackendSelector::new(vec![
            local.clone() as Arc<dyn TranscriptionBackend>,
            hosted.clone(),
        ]);

        let active = selector.resolve(BackendChoice::Hosted).await.unwrap();
        assert_eq!(active.choice, BackendChoice::Hosted);
        assert!(!active.fell_back);
        assert_eq!(local.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_is_deterministic() {
        let selector = BackendSelector::new(vec![
            StubBackend::new(BackendChoice::Hosted, false) as Arc<dyn TranscriptionBackend>,
            StubBackend::new(BackendChoice::Local, true),
        ]);

        for _ in 0..3 {
            let active = selector.resolve(BackendChoice::Hosted).await.unwrap();
            assert_eq!(active.choice, BackendChoice::Local);
            assert_eq!(active.backend.name(), "stub-local");
            assert!(active.fell_back);
        }
    }

    #[tokio::test]
    async fn test_no_backend_available() {
        let selector = BackendSelector::new(vec![
            StubBackend::new(BackendChoice::Local, false) as Arc<dyn TranscriptionBackend>,
            StubBackend::new(BackendChoice::Hosted, false),
        ]);

        match selector.resolve(BackendChoice::Local).await {
            Err(ConfigurationError::NoBackendAvailable { tried }) => {
                let local_at = tried.find("local").unwrap();
                let hosted_at = tried.find("hosted").unwrap();
                assert!(local_at < hosted_at);
                assert!(tried.contains("weights missing"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_candidate_is_skipped() {
        let selector = BackendSelector::new(vec![
            StubBackend::new(BackendChoice::Hosted, true) as Arc<dyn TranscriptionBackend>
        ]);
        let active = selector.resolve(BackendChoice::Local).await.unwrap();
        assert_eq!(active.choice, BackendChoice::Hosted);
        assert!(active.fell_back);
    }

    #[tokio::test]
    async fn test_misconfigured_backend_is_skipped() {
        let selector = BackendSelector::new(vec![
            StubBackend::new(BackendChoice::Local, true) as Arc<dyn TranscriptionBackend>
        ])
        .with_misconfigured(BackendChoice::Hosted, "invalid endpoint URL");

        let active = selector.resolve(BackendChoice::Hosted).await.unwrap();
        assert_eq!(active.choice, BackendChoice::Local);
        assert!(active.fell_back);
    }

    #[tokio::test]
    async fn test_misconfiguration_named_when_nothing_usable() {
        let selector = BackendSelector::new(vec![
            StubBackend::new(BackendChoice::Local, false) as Arc<dyn TranscriptionBackend>
        ])
        .with_misconfigured(BackendChoice::Hosted, "invalid endpoint URL");

        match selector.resolve(BackendChoice::Local).await {
            Err(ConfigurationError::NoBackendAvailable { tried }) => {
                assert!(tried.contains("local ("));
                assert!(tried.contains("hosted (invalid endpoint URL)"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_from_settings_survives_bad_hosted_url() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ggml-small.bin"), b"weights").unwrap();

        let mut settings = Settings::default();
        settings.transcription.model_size = "small".to_string();
        settings.transcription.local.models_dir = dir.path().to_string_lossy().into_owned();
        // `echo --help` succeeds, standing in for whisper-cli.
        settings.transcription.local.binary = "echo".to_string();
        settings.transcription.hosted.base_url = "not a url".to_string();

        let selector = BackendSelector::from_settings(&settings).await;
        let active = selector.resolve(BackendChoice::Hosted).await.unwrap();
        assert_eq!(active.choice, BackendChoice::Local);
        assert!(active.fell_back);
    }

    #[tokio::test]
    async fn test_from_settings_survives_bad_local_windows() {
        let mut settings = Settings::default();
        settings.transcription.local.safety_margin_seconds = settings.transcription.local.single_pass_ceiling_seconds;
        settings.transcription.hosted.base_url = "http://127.0.0.1:9".to_string();

        let selector = BackendSelector::from_settings(&settings).await;
        match selector.resolve(BackendChoice::Local).await {
            Err(ConfigurationError::NoBackendAvailable { tried }) => {
                assert!(tried.starts_with("local (Configuration error: audio window"));
                assert!(tried.contains("hosted ("));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
