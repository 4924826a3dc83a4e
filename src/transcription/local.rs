//! whisper.cpp backend running on this machine.

use super::{BackendChoice, ComputeDevice, TranscriptResult, TranscriptionBackend};
use crate::audio::{render_window_wav, AudioArtifact, WindowPlan};
use crate::config::Settings;
use crate::error::{ConfigurationError, TranscriptionError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Local speech model driven through the whisper.cpp CLI.
pub struct LocalModelBackend {
    binary: String,
    model_size: String,
    model_path: PathBuf,
    beam_size: u32,
    threads: Option<u32>,
    device: ComputeDevice,
    plan: WindowPlan,
    ffmpeg: String,
    scratch_root: PathBuf,
}

impl LocalModelBackend {
    pub fn new(settings: &Settings, device: ComputeDevice) -> Result<Self, ConfigurationError> {
        let local = &settings.transcription.local;
        let plan = WindowPlan::new(
            local.single_pass_ceiling_seconds,
            local.safety_margin_seconds,
            local.window_overlap_seconds,
        )?;
        let model_size = settings.transcription.model_size.clone();
        let model_path = settings.models_dir().join(format!("ggml-{model_size}.bin"));

        info!(
            "Local backend: model {} on {} ({})",
            model_size,
            device,
            device.precision()
        );

        Ok(Self {
            binary: local.binary.clone(),
            model_size,
            model_path,
            beam_size: local.beam_size,
            threads: local.threads,
            device,
            plan,
            ffmpeg: settings.audio.ffmpeg.clone(),
            scratch_root: settings.temp_dir(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn whisper_args(&self, wav: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-m".into(),
            self.model_path.clone().into(),
            "-f".into(),
            wav.into(),
            "-bs".into(),
            self.beam_size.to_string().into(),
            "-l".into(),
            "auto".into(),
            "-nt".into(),
            "-np".into(),
        ];
        if let Some(threads) = self.threads {
            args.push("-t".into());
            args.push(threads.to_string().into());
        }
        if !self.device.is_accelerator() {
            args.push("--no-gpu".into());
        }
        args
    }

    /// Run the binary on one WAV file and return its stdout as one line.
    async fn run_whisper(&self, wav: &Path) -> Result<String, TranscriptionError> {
        let output = Command::new(&self.binary)
            .args(self.whisper_args(wav))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TranscriptionError::BackendUnavailable {
                    backend: self.name(),
                    reason: format!("{} not found in PATH", self.binary),
                },
                _ => TranscriptionError::InferenceFailed(format!(
                    "failed to run {}: {}",
                    self.binary, e
                )),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptionError::InferenceFailed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        Ok(join_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn join_lines(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl TranscriptionBackend for LocalModelBackend {
    fn choice(&self) -> BackendChoice {
        BackendChoice::Local
    }

    fn name(&self) -> String {
        format!("whisper.cpp ({})", self.model_size)
    }

    async fn check_available(&self) -> Result<(), TranscriptionError> {
        if !self.model_path.is_file() {
            return Err(TranscriptionError::BackendUnavailable {
                backend: self.name(),
                reason: format!("model file {} is missing", self.model_path.display()),
            });
        }

        let probe = Command::new(&self.binary)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match probe {
            Ok(_) => Ok(()),
            Err(e) => Err(TranscriptionError::BackendUnavailable {
                backend: self.name(),
                reason: format!("cannot run {}: {}", self.binary, e),
            }),
        }
    }

    #[instrument(skip_all, fields(audio = %audio.path.display()))]
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<TranscriptResult, TranscriptionError> {
        let windows = self.plan.plan(audio.duration_seconds);
        if windows.len() > 1 {
            info!(
                "Audio is {:.0}s, transcribing in {} windows of {:.0}s",
                audio.duration_seconds,
                windows.len(),
                self.plan.window_length()
            );
        }

        tokio::fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(crate::error::ExtractionError::from)?;
        // Dropped at the end of the job, removing any window files left over.
        let scratch = tempfile::Builder::new()
            .prefix("referat-windows-")
            .tempdir_in(&self.scratch_root)
            .map_err(crate::error::ExtractionError::from)?;

        let mut parts = Vec::with_capacity(windows.len());
        for window in &windows {
            let wav = scratch.path().join(format!("window_{:03}.wav", window.index));
            render_window_wav(&self.ffmpeg, &audio.path, &wav, window).await?;

            let text = self.run_whisper(&wav).await;
            if let Err(e) = tokio::fs::remove_file(&wav).await {
                warn!("Failed to remove window file {}: {}", wav.display(), e);
            }
            let text = text?;

            debug!("Window {} produced {} characters", window.index, text.len());
            if !text.is_empty() {
                parts.push(text);
            }
        }

        TranscriptResult::new(parts.join(" "), windows.len())
    }
}
