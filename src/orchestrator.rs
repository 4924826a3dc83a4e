//! Pipeline orchestrator for Referat.
//!
//! Runs every video of a batch through extract, transcribe, summarize and
//! persist, strictly one job at a time. Per-job failures become entries in
//! the [`RunReport`]; they never abort the batch.

use crate::audio::{AudioExtractor, FfmpegExtractor};
use crate::chunking::{Cl100kTokenizer, TextChunker};
use crate::config::{Prompts, Settings};
use crate::error::{PersistenceError, Result};
use crate::llm::{self, LlmClient, OllamaClient};
use crate::media::{MediaJob, OutputLayout};
use crate::summarize::{SummarizationEngine, Summary};
use crate::transcription::{ActiveBackend, BackendChoice, BackendSelector};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Everything a run needs, built once at startup and shared by all jobs.
pub struct RunContext {
    pub settings: Settings,
    pub prompts: Prompts,
    pub backend: ActiveBackend,
    pub llm: Arc<dyn LlmClient>,
    pub llm_model: String,
    pub chunker: TextChunker,
    pub extractor: Arc<dyn AudioExtractor>,
}

impl RunContext {
    /// Resolve every run-wide component from the settings.
    ///
    /// Chunking parameters are validated first, then the transcription
    /// backend and the LLM model are resolved. Any failure here is fatal.
    pub async fn build<F>(settings: Settings, preferred: BackendChoice, choose_model: F) -> Result<Self>
    where
        F: FnOnce(&[String]) -> Option<String>,
    {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let chunker = TextChunker::new(
            Arc::new(Cl100kTokenizer::new()?),
            settings.summarization.max_tokens,
            settings.summarization.overlap_tokens,
        )?;

        let backend = BackendSelector::from_settings(&settings)
            .await
            .resolve(preferred)
            .await?;

        let client = OllamaClient::from_settings(&settings)?;
        let llm_model = llm::resolve_model(&client, settings.llm.model.as_deref(), choose_model).await?;
        info!("Summarizing with {} at {}", llm_model, client.endpoint());

        let extractor = Arc::new(FfmpegExtractor::new(&settings.audio));

        Ok(Self {
            settings,
            prompts,
            backend,
            llm: Arc::new(client),
            llm_model,
            chunker,
            extractor,
        })
    }
}

/// Pipeline stage a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Extract,
    Transcribe,
    PersistTranscript,
    Summarize,
    PersistSummary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Transcribe => "transcribe",
            Stage::PersistTranscript => "persist-transcript",
            Stage::Summarize => "summarize",
            Stage::PersistSummary => "persist-summary",
        };
        f.write_str(name)
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum JobStatus {
    /// Transcript and summary were both written.
    Completed,
    /// A summary exists but the transcript file could not be written.
    Incomplete { stage: Stage, reason: String },
    /// The transcript was written but no summary was.
    SummaryFailed { stage: Stage, reason: String },
    /// The job stopped before producing a transcript.
    Skipped { stage: Stage, reason: String },
}

/// Report for one input file.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// 1-based position in the batch.
    pub index: usize,
    pub file: String,
    pub status: JobStatus,
    pub transcript: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

/// Report for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.jobs.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Completed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Skipped { .. }))
    }

    pub fn summary_failures(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::SummaryFailed { .. }))
    }

    pub fn incomplete(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Incomplete { .. }))
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.status)).count()
    }
}

/// Sequential batch runner over a [`RunContext`].
pub struct Pipeline<'a> {
    ctx: &'a RunContext,
    layout: OutputLayout,
    progress: ProgressBar,
}

impl<'a> Pipeline<'a> {
    pub fn new(ctx: &'a RunContext, layout: OutputLayout) -> Self {
        Self {
            ctx,
            layout,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress on `bar` instead of a hidden bar.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    /// Process `videos` in order. Only failing to create the output
    /// directories aborts the run.
    pub async fn run(&self, videos: &[PathBuf]) -> Result<RunReport> {
        self.layout.ensure()?;

        let started_at = Utc::now();
        self.progress.set_length(videos.len() as u64);

        let mut jobs = Vec::with_capacity(videos.len());
        let mut taken = HashSet::new();
        for (i, video) in videos.iter().enumerate() {
            let mut job = MediaJob::new(i + 1, video.clone());
            if job.claim_base_name(&mut taken) {
                info!("Output name for {} is {}", job.file_name(), job.base_name);
            }
            self.progress.set_message(job.file_name());
            jobs.push(self.process(&job).await);
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            jobs,
        };
        info!(
            "Run finished: {} processed, {} succeeded, {} skipped",
            report.processed(),
            report.succeeded(),
            report.skipped()
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(job = job.index, file = %job.file_name()))]
    async fn process(&self, job: &MediaJob) -> JobReport {
        let file = job.file_name();
        let mut report = JobReport {
            index: job.index,
            file: file.clone(),
            status: JobStatus::Completed,
            transcript: None,
            summary: None,
        };

        let skip = |stage: Stage, reason: String| {
            warn!(file = %file, stage = %stage, "Skipping {}: {} failed: {}", file, stage, reason);
            JobStatus::Skipped { stage, reason }
        };

        info!("Extracting audio");
        let audio = match self.ctx.extractor.extract(&job.source, &job.audio_path(&self.layout)).await {
            Ok(audio) => audio,
            Err(e) => {
                report.status = skip(Stage::Extract, e.to_string());
                return report;
            }
        };

        info!("Transcribing {:.0}s of audio with {}", audio.duration_seconds, self.ctx.backend.backend.name());
        let transcript = match self.ctx.backend.backend.transcribe(&audio).await {
            Ok(t) => t,
            Err(e) => {
                report.status = skip(Stage::Transcribe, e.to_string());
                return report;
            }
        };

        if transcript.is_assembled() {
            info!("Transcript assembled from {} audio windows", transcript.windows);
        }

        let transcript_path = job.transcript_path(&self.layout);
        let mut transcript_failure = None;
        match persist(&transcript_path, &transcript.text).await {
            Ok(()) => report.transcript = Some(transcript_path),
            Err(e) => {
                warn!(file = %file, stage = %Stage::PersistTranscript, "{}", e);
                transcript_failure = Some(e.to_string());
            }
        }

        let engine = SummarizationEngine::new(
            &self.ctx.chunker,
            &self.ctx.prompts,
            self.ctx.llm.as_ref(),
            &self.ctx.llm_model,
        );
        let summary = match engine.summarize(&transcript.text).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(file = %file, stage = %Stage::Summarize, "Summary failed for {}: {}", file, e);
                report.status = JobStatus::SummaryFailed {
                    stage: Stage::Summarize,
                    reason: e.to_string(),
                };
                return report;
            }
        };
        log_summary(&summary);

        let summary_path = job.summary_path(&self.layout);
        match persist(&summary_path, &summary.text).await {
            Ok(()) => report.summary = Some(summary_path),
            Err(e) => {
                warn!(file = %file, stage = %Stage::PersistSummary, "{}", e);
                report.status = JobStatus::SummaryFailed {
                    stage: Stage::PersistSummary,
                    reason: e.to_string(),
                };
                return report;
            }
        }

        if let Some(reason) = transcript_failure {
            report.status = JobStatus::Incomplete {
                stage: Stage::PersistTranscript,
                reason,
            };
        }
        report
    }
}

fn log_summary(summary: &Summary) {
    if summary.sections_skipped() > 0 {
        warn!(
            "Summary built from {} of {} chunks",
            summary.sections_used, summary.chunk_count
        );
    } else {
        info!("Summary ready ({} chunk(s))", summary.chunk_count);
    }
}

async fn persist(path: &Path, contents: &str) -> std::result::Result<(), PersistenceError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })
}
