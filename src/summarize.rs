//! Map-reduce summarization of transcripts.
//!
//! A transcript that fits in one chunk is summarized with a single direct
//! call. Longer transcripts get one section summary per chunk (failed chunks
//! are skipped) followed by one combine call over the surviving sections.

use crate::chunking::TextChunker;
use crate::config::Prompts;
use crate::error::SummarizationError;
use crate::llm::LlmClient;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Separator placed between section summaries before the combine call.
pub const SECTION_DELIMITER: &str = "\n\n---\n\n";

/// How the final summary was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    /// Single chunk, one call.
    Direct,
    /// Section summaries merged by a combine call.
    Combined,
}

/// The final summary of one transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub text: String,
    pub kind: SummaryKind,
    /// Chunks the transcript was split into.
    pub chunk_count: usize,
    /// Section summaries that went into the combine call.
    pub sections_used: usize,
}

impl Summary {
    pub fn sections_skipped(&self) -> usize {
        match self.kind {
            SummaryKind::Direct => 0,
            SummaryKind::Combined => self.chunk_count - self.sections_used,
        }
    }
}

/// Drives the LLM through chunk, map and reduce.
pub struct SummarizationEngine<'a> {
    chunker: &'a TextChunker,
    prompts: &'a Prompts,
    client: &'a dyn LlmClient,
    model: &'a str,
}

impl<'a> SummarizationEngine<'a> {
    pub fn new(
        chunker: &'a TextChunker,
        prompts: &'a Prompts,
        client: &'a dyn LlmClient,
        model: &'a str,
    ) -> Self {
        Self {
            chunker,
            prompts,
            client,
            model,
        }
    }

    #[instrument(skip_all, fields(model = self.model, chars = transcript.len()))]
    pub async fn summarize(&self, transcript: &str) -> Result<Summary, SummarizationError> {
        if transcript.trim().is_empty() {
            return Err(SummarizationError::EmptyTranscript);
        }

        let chunks = self.chunker.split(transcript);
        let templates = &self.prompts.summary;

        if chunks.len() <= 1 {
            let text = chunks.first().map(|c| c.text.as_str()).unwrap_or(transcript);
            info!("Transcript fits in one chunk, summarizing directly");
            let summary = self
                .client
                .generate(self.model, &self.prompts.render_summary(&templates.direct, text))
                .await
                .map_err(SummarizationError::DirectCallFailed)?;

            return Ok(Summary {
                text: summary,
                kind: SummaryKind::Direct,
                chunk_count: 1,
                sections_used: 1,
            });
        }

        info!("Summarizing {} chunks", chunks.len());
        let mut sections = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let prompt = self.prompts.render_summary(&templates.section, &chunk.text);
            match self.client.generate(self.model, &prompt).await {
                Ok(section) => {
                    debug!("Chunk {}/{} summarized", chunk.index + 1, chunks.len());
                    sections.push(section);
                }
                Err(e) => {
                    warn!(chunk = chunk.index, "Skipping chunk {}/{}: {}", chunk.index + 1, chunks.len(), e);
                }
            }
        }

        if sections.is_empty() {
            return Err(SummarizationError::NoIntermediateSummaries {
                chunks: chunks.len(),
            });
        }

        let joined = sections.join(SECTION_DELIMITER);
        info!(
            "Combining {} of {} section summaries",
            sections.len(),
            chunks.len()
        );
        let text = self
            .client
            .generate(self.model, &self.prompts.render_summary(&templates.combined, &joined))
            .await
            .map_err(SummarizationError::CombineCallFailed)?;

        Ok(Summary {
            text,
            kind: SummaryKind::Combined,
            chunk_count: chunks.len(),
            sections_used: sections.len(),
        })
    }
}
