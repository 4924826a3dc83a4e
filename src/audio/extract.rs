//! ffmpeg/ffprobe wrappers.
//!
//! Extraction always transcodes to a fixed codec and bitrate so downstream
//! speech models see a predictable input. Window rendering produces the
//! 16 kHz mono WAV that whisper.cpp consumes.

use super::{AudioArtifact, AudioExtractor, AudioWindow};
use crate::config::AudioSettings;
use crate::error::ExtractionError;
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Audio extractor backed by the ffmpeg command line tools.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg: String,
    ffprobe: String,
    codec: String,
    bitrate: String,
}

impl FfmpegExtractor {
    pub fn new(settings: &AudioSettings) -> Self {
        Self {
            ffmpeg: settings.ffmpeg.clone(),
            ffprobe: settings.ffprobe.clone(),
            codec: settings.codec.clone(),
            bitrate: settings.bitrate.clone(),
        }
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new(&AudioSettings::default())
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    #[instrument(skip(self), fields(video = %video.display()))]
    async fn extract(&self, video: &Path, dest: &Path) -> Result<AudioArtifact, ExtractionError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Extracting audio to {}", dest.display());

        let result = Command::new(&self.ffmpeg)
            .arg("-i").arg(video)
            .arg("-y")
            .arg("-vn")
            .arg("-acodec").arg(&self.codec)
            .arg("-ab").arg(&self.bitrate)
            .arg("-loglevel").arg("error")
            .arg(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        if let Err(e) = check_output(&self.ffmpeg, result) {
            remove_partial(dest);
            return Err(e);
        }

        match probe_duration(&self.ffprobe, dest).await {
            Ok(duration_seconds) => {
                info!("Extracted {:.1}s of audio", duration_seconds);
                Ok(AudioArtifact::new(dest.to_path_buf(), duration_seconds))
            }
            Err(e) => {
                remove_partial(dest);
                Err(e)
            }
        }
    }
}

/// Renders one time window of `source` as 16 kHz mono PCM WAV.
#[instrument(skip_all, fields(window = window.index))]
pub async fn render_window_wav(
    ffmpeg: &str,
    source: &Path,
    dest: &Path,
    window: &AudioWindow,
) -> Result<(), ExtractionError> {
    debug!(
        "Rendering window {} ({:.1}s + {:.1}s)",
        window.index, window.start_seconds, window.length_seconds
    );

    let result = Command::new(ffmpeg)
        .arg("-ss").arg(format!("{:.3}", window.start_seconds))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", window.length_seconds))
        .arg("-ar").arg("16000")
        .arg("-ac").arg("1")
        .arg("-c:a").arg("pcm_s16le")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    if let Err(e) = check_output(ffmpeg, result) {
        remove_partial(dest);
        return Err(e);
    }
    Ok(())
}

/// Queries the duration of an audio file using ffprobe with JSON output.
pub async fn probe_duration(ffprobe: &str, path: &Path) -> Result<f64, ExtractionError> {
    let result = Command::new(ffprobe)
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExtractionError::ToolMissing(ffprobe.into()));
        }
        Err(e) => return Err(ExtractionError::ProbeFailed(format!("{ffprobe} failed: {e}"))),
    };

    if !output.status.success() {
        return Err(ExtractionError::ProbeFailed(format!("{ffprobe} returned error")));
    }

    parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Extracts `format.duration` from ffprobe's JSON output.
fn parse_probe_duration(json_str: &str) -> Result<f64, ExtractionError> {
    let parsed: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|_| ExtractionError::ProbeFailed("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ExtractionError::ProbeFailed("Could not determine audio duration".into()))
}

/// Maps a finished tool invocation onto the extraction error taxonomy.
fn check_output(tool: &str, result: std::io::Result<Output>) -> Result<(), ExtractionError> {
    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            Err(ExtractionError::DecodeFailed(stderr))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolMissing(tool.into()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_duration() {
        let json = r#"{"format": {"filename": "a.mp3", "duration": "612.480000"}}"#;
        assert!((parse_probe_duration(json).unwrap() - 612.48).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_duration_missing() {
        assert!(matches!(
            parse_probe_duration(r#"{"format": {}}"#),
            Err(ExtractionError::ProbeFailed(_))
        ));
        assert!(matches!(
            parse_probe_duration("not json"),
            Err(ExtractionError::ProbeFailed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_output_distinguishes_missing_tool() {
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        let missing = Err(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(
            check_output("ffmpeg", missing),
            Err(ExtractionError::ToolMissing(t)) if t == "ffmpeg"
        ));

        let failed = Ok(Output {
            status: ExitStatus::from_raw(1 << 8),
            stdout: Vec::new(),
            stderr: b"Invalid data found when processing input\n".to_vec(),
        });
        assert!(matches!(
            check_output("ffmpeg", failed),
            Err(ExtractionError::DecodeFailed(s)) if s == "Invalid data found when processing input"
        ));
    }

    #[tokio::test]
    async fn test_extract_cleans_up_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("broken.mp4");
        std::fs::write(&video, b"this is not a video").unwrap();
        let dest = dir.path().join("out").join("broken.mp3");

        let result = FfmpegExtractor::default().extract(&video, &dest).await;

        // Either ffmpeg is absent or it rejects the input; both must leave nothing behind.
        assert!(matches!(
            result,
            Err(ExtractionError::ToolMissing(_)) | Err(ExtractionError::DecodeFailed(_))
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_missing_configured_ffmpeg_is_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("talk.mp4");
        std::fs::write(&video, b"video").unwrap();
        let dest = dir.path().join("talk.mp3");

        let extractor = FfmpegExtractor::new(&AudioSettings {
            ffmpeg: "referat-no-such-ffmpeg".to_string(),
            ..AudioSettings::default()
        });

        assert!(matches!(
            extractor.extract(&video, &dest).await,
            Err(ExtractionError::ToolMissing(t)) if t == "referat-no-such-ffmpeg"
        ));
        assert!(!dest.exists());
    }
}
