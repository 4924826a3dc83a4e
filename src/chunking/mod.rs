//! Token-aware text chunking.
//!
//! Splits a transcript into windows of at most `max_tokens` model tokens, each
//! window sharing `overlap_tokens` with its predecessor so that context carries
//! across chunk boundaries.

mod tokenizer;

pub use tokenizer::{Cl100kTokenizer, Tokenizer};

#[cfg(test)]
pub(crate) use tokenizer::testing::WordTokenizer;

use crate::error::ConfigurationError;
use std::sync::Arc;
use tracing::debug;

/// A bounded slice of a longer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk in the sequence.
    pub index: usize,
    /// Offset of the first token in the source token sequence.
    pub start_token: usize,
    /// Number of tokens in this chunk.
    pub token_count: usize,
    /// Decoded text of the chunk.
    pub text: String,
}

/// Sliding-window chunker measured in tokens.
#[derive(Clone)]
pub struct TextChunker {
    tokenizer: Arc<dyn Tokenizer>,
    max_tokens: usize,
    overlap_tokens: usize,
}

impl TextChunker {
    /// Create a chunker. Fails unless `overlap_tokens < max_tokens`.
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        max_tokens: usize,
        overlap_tokens: usize,
    ) -> Result<Self, ConfigurationError> {
        if overlap_tokens >= max_tokens {
            return Err(ConfigurationError::InvalidOverlap {
                max: max_tokens,
                overlap: overlap_tokens,
            });
        }

        Ok(Self {
            tokenizer,
            max_tokens,
            overlap_tokens,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Number of chunks `split` yields for `total_tokens` tokens.
    pub fn expected_chunks(&self, total_tokens: usize) -> usize {
        if total_tokens == 0 {
            return 0;
        }
        let step = self.max_tokens - self.overlap_tokens;
        total_tokens
            .saturating_sub(self.overlap_tokens)
            .div_ceil(step)
            .max(1)
    }

    /// Split `text` into ordered, overlapping chunks.
    ///
    /// The text is tokenized once; a window of `max_tokens` advances by
    /// `max_tokens - overlap_tokens` and the final window may be shorter.
    /// Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let tokens = self.tokenizer.encode(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let step = self.max_tokens - self.overlap_tokens;
        let mut chunks = Vec::with_capacity(self.expected_chunks(tokens.len()));
        let mut start = 0;

        loop {
            let end = (start + self.max_tokens).min(tokens.len());
            let window = &tokens[start..end];
            chunks.push(TextChunk {
                index: chunks.len(),
                start_token: start,
                token_count: window.len(),
                text: self.tokenizer.decode(window),
            });

            if end >= tokens.len() {
                break;
            }
            start += step;
        }

        debug!(
            "Split {} tokens into {} chunk(s) (max {}, overlap {})",
            tokens.len(),
            chunks.len(),
            self.max_tokens,
            self.overlap_tokens
        );
        chunks
    }
}
