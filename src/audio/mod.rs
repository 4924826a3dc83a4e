//! Audio extraction and windowing.
//!
//! This module pulls the audio stream out of a video container with ffmpeg and
//! plans the overlapping time windows used when a recording is too long for a
//! single transcription pass.

mod extract;

pub use extract::{probe_duration, render_window_wav, FfmpegExtractor};

use crate::error::{ConfigurationError, ExtractionError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// An extracted, decodable audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

impl AudioArtifact {
    pub fn new(path: PathBuf, duration_seconds: f64) -> Self {
        Self {
            path,
            duration_seconds,
        }
    }
}

/// Trait for pulling audio out of a video container.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract the audio of `video` into `dest`.
    ///
    /// On failure no file is left at `dest`.
    async fn extract(&self, video: &Path, dest: &Path) -> Result<AudioArtifact, ExtractionError>;
}

/// One time window of a longer recording.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioWindow {
    pub index: usize,
    pub start_seconds: f64,
    pub length_seconds: f64,
}

impl AudioWindow {
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.length_seconds
    }
}

/// Splitting policy for long recordings.
///
/// Audio up to `ceiling` seconds is a single window. Longer audio is cut into
/// windows of `ceiling - margin` seconds, each starting `overlap` seconds
/// before the previous one ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPlan {
    ceiling: f64,
    length: f64,
    overlap: f64,
}

impl WindowPlan {
    pub fn new(
        ceiling_seconds: u32,
        margin_seconds: u32,
        overlap_seconds: u32,
    ) -> Result<Self, ConfigurationError> {
        let length = ceiling_seconds.saturating_sub(margin_seconds);
        if length == 0 || overlap_seconds >= length {
            return Err(ConfigurationError::Invalid(format!(
                "audio window of {ceiling_seconds}s - {margin_seconds}s margin must exceed the {overlap_seconds}s overlap"
            )));
        }

        Ok(Self {
            ceiling: ceiling_seconds as f64,
            length: length as f64,
            overlap: overlap_seconds as f64,
        })
    }

    /// Window length used once splitting kicks in.
    pub fn window_length(&self) -> f64 {
        self.length
    }

    /// Plan the windows for a recording of `duration` seconds.
    pub fn plan(&self, duration: f64) -> Vec<AudioWindow> {
        if duration <= self.ceiling {
            return vec![AudioWindow {
                index: 0,
                start_seconds: 0.0,
                length_seconds: duration.max(0.0),
            }];
        }

        let step = self.length - self.overlap;
        let mut windows = Vec::new();
        let mut start = 0.0;

        loop {
            let length = self.length.min(duration - start);
            windows.push(AudioWindow {
                index: windows.len(),
                start_seconds: start,
                length_seconds: length,
            });

            if start + self.length >= duration {
                break;
            }
            start += step;
        }

        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> WindowPlan {
        WindowPlan::new(1800, 60, 10).unwrap()
    }

    #[test]
    fn test_short_audio_is_single_window() {
        let windows = plan().plan(600.0);
        assert_eq!(
            windows,
            vec![AudioWindow {
                index: 0,
                start_seconds: 0.0,
                length_seconds: 600.0
            }]
        );
    }

    #[test]
    fn test_audio_at_ceiling_is_single_window() {
        assert_eq!(plan().plan(1800.0).len(), 1);
    }

    #[test]
    fn test_long_audio_windows_overlap() {
        let windows = plan().plan(3600.0);
        assert_eq!(windows.len(), 3);

        assert_eq!(windows[0].start_seconds, 0.0);
        assert_eq!(windows[0].length_seconds, 1740.0);
        assert_eq!(windows[1].start_seconds, 1730.0);
        assert_eq!(windows[1].length_seconds, 1740.0);
        assert_eq!(windows[2].start_seconds, 3460.0);
        assert_eq!(windows[2].length_seconds, 140.0);

        for pair in windows.windows(2) {
            assert_eq!(pair[0].end_seconds() - pair[1].start_seconds, 10.0);
        }
        assert_eq!(windows.last().unwrap().end_seconds(), 3600.0);
    }

    #[test]
    fn test_windows_are_ordered_and_indexed() {
        let windows = plan().plan(10_000.0);
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.index, i);
            assert!(w.length_seconds <= 1740.0);
        }
        assert!(windows.windows(2).all(|p| p[0].start_seconds < p[1].start_seconds));
    }

    #[test]
    fn test_invalid_plan_rejected() {
        assert!(WindowPlan::new(60, 60, 0).is_err());
        assert!(WindowPlan::new(100, 50, 50).is_err());
        assert!(WindowPlan::new(100, 50, 49).is_ok());
    }
}
