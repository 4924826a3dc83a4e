//! Input discovery and output layout.
//!
//! Every recognized video in the input folder becomes one [`MediaJob`]. Outputs
//! land in a sibling `<folder>_Output` directory with one subdirectory per
//! artifact kind.

use crate::error::{ConfigurationError, PersistenceError};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Supported video file extensions (audio will be extracted).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "m4v", "flv", "wmv", "mpeg", "mpg",
];

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

/// Check if path is a supported video file.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Make a file stem safe for use as an output file name.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, "");
    let cleaned = cleaned.trim().replace(' ', "_");
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}

/// List the video files directly inside `folder`, sorted by file name.
pub fn discover_videos(folder: &Path) -> Result<Vec<PathBuf>, ConfigurationError> {
    if !folder.is_dir() {
        return Err(ConfigurationError::InputFolderMissing(folder.to_path_buf()));
    }

    let entries = std::fs::read_dir(folder)
        .map_err(|e| ConfigurationError::Invalid(format!("Cannot read {}: {e}", folder.display())))?;

    let mut videos: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_video_file(p))
        .collect();

    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(videos)
}

/// Directory triple for one run's outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub audio_dir: PathBuf,
    pub transcript_dir: PathBuf,
    pub summary_dir: PathBuf,
}

impl OutputLayout {
    /// Derive the layout from the input folder: `<parent>/<name>_Output/...`.
    pub fn for_input(folder: &Path) -> Self {
        let absolute = std::path::absolute(folder).unwrap_or_else(|_| folder.to_path_buf());
        let name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "videos".to_string());
        let parent = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self::at(parent.join(format!("{}_Output", sanitize_filename(&name))))
    }

    /// Layout rooted at an explicit directory.
    pub fn at(root: PathBuf) -> Self {
        Self {
            audio_dir: root.join("1_Audio_Files"),
            transcript_dir: root.join("2_Transcripts"),
            summary_dir: root.join("3_Summaries"),
            root,
        }
    }

    /// Create all output directories.
    pub fn ensure(&self) -> Result<(), PersistenceError> {
        for dir in [&self.audio_dir, &self.transcript_dir, &self.summary_dir] {
            std::fs::create_dir_all(dir).map_err(|source| PersistenceError::Write {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// One video input.
#[derive(Debug, Clone)]
pub struct MediaJob {
    /// 1-based position in the batch.
    pub index: usize,
    /// Path to the source video.
    pub source: PathBuf,
    /// Sanitized file stem used for every output artifact.
    pub base_name: String,
}

impl MediaJob {
    pub fn new(index: usize, source: PathBuf) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            index,
            base_name: sanitize_filename(&stem),
            source,
        }
    }

    /// Make `base_name` unique within a batch by suffixing `_2`, `_3`, ...
    ///
    /// Names are compared case-insensitively so outputs stay distinct on
    /// case-insensitive filesystems. Returns whether the name changed.
    pub fn claim_base_name(&mut self, taken: &mut HashSet<String>) -> bool {
        if taken.insert(self.base_name.to_lowercase()) {
            return false;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", self.base_name, n);
            if taken.insert(candidate.to_lowercase()) {
                self.base_name = candidate;
                return true;
            }
            n += 1;
        }
    }

    /// Display name of the source file.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    pub fn audio_path(&self, layout: &OutputLayout) -> PathBuf {
        layout.audio_dir.join(format!("{}.mp3", self.base_name))
    }

    pub fn transcript_path(&self, layout: &OutputLayout) -> PathBuf {
        layout.transcript_dir.join(format!("{}_transcript.txt", self.base_name))
    }

    pub fn summary_path(&self, layout: &OutputLayout) -> PathBuf {
        layout.summary_dir.join(format!("{}_summary.md", self.base_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("lecture.mp4")));
        assert!(is_video_file(Path::new("lecture.MKV")));
        assert!(is_video_file(Path::new("/path/to/clip.mov")));
        assert!(!is_video_file(Path::new("audio.mp3")));
        assert!(!is_video_file(Path::new("notes.pdf")));
        assert!(!is_video_file(Path::new("no_extension")));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Lecture 1: Equity & Bonds"), "Lecture_1_Equity__Bonds");
        assert_eq!(sanitize_filename("  week-02 (final)  "), "week-02_final");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("???"), "video");
    }

    #[test]
    fn test_discover_videos_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.MOV", "notes.txt", "c.mkv", "audio.mp3"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let videos = discover_videos(dir.path()).unwrap();
        let names: Vec<_> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.MOV", "b.mp4", "c.mkv"]);
    }

    #[test]
    fn test_discover_videos_missing_folder() {
        let err = discover_videos(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ConfigurationError::InputFolderMissing(_)));
    }

    #[test]
    fn test_output_layout_for_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("MF");
        std::fs::create_dir(&input).unwrap();

        let layout = OutputLayout::for_input(&input);
        assert_eq!(layout.root, dir.path().join("MF_Output"));
        assert_eq!(layout.audio_dir, dir.path().join("MF_Output/1_Audio_Files"));
        assert_eq!(layout.transcript_dir, dir.path().join("MF_Output/2_Transcripts"));
        assert_eq!(layout.summary_dir, dir.path().join("MF_Output/3_Summaries"));

        layout.ensure().unwrap();
        assert!(layout.summary_dir.is_dir());
    }

    #[test]
    fn test_job_paths() {
        let layout = OutputLayout::at(PathBuf::from("/out"));
        let job = MediaJob::new(1, PathBuf::from("/in/Week 3: Options.mp4"));
        assert_eq!(job.base_name, "Week_3_Options");
        assert_eq!(job.file_name(), "Week 3: Options.mp4");
        assert_eq!(job.audio_path(&layout), PathBuf::from("/out/1_Audio_Files/Week_3_Options.mp3"));
        assert_eq!(
            job.transcript_path(&layout),
            PathBuf::from("/out/2_Transcripts/Week_3_Options_transcript.txt")
        );
        assert_eq!(
            job.summary_path(&layout),
            PathBuf::from("/out/3_Summaries/Week_3_Options_summary.md")
        );
    }

    #[test]
    fn test_colliding_base_names_are_suffixed() {
        let mut taken = HashSet::new();
        let mut names = Vec::new();
        for (i, file) in ["talk.mkv", "talk.mp4", "a b.mp4", "a_b.mp4", "Talk.mov", "talk_2.webm"]
            .iter()
            .enumerate()
        {
            let mut job = MediaJob::new(i + 1, PathBuf::from(file));
            job.claim_base_name(&mut taken);
            names.push(job.base_name);
        }
        assert_eq!(names, ["talk", "talk_2", "a_b", "a_b_2", "Talk_3", "talk_2_2"]);
    }

    #[test]
    fn test_unique_base_name_is_kept() {
        let mut taken = HashSet::new();
        let mut job = MediaJob::new(1, PathBuf::from("/in/intro.mp4"));
        assert!(!job.claim_base_name(&mut taken));
        assert_eq!(job.base_name, "intro");
    }
}
