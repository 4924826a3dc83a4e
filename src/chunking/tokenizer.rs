//! Subword tokenizers used to measure chunk sizes.

use crate::error::ConfigurationError;
use tiktoken_rs::CoreBPE;

/// Trait for a reversible subword tokenizer.
pub trait Tokenizer: Send + Sync {
    /// Tokenize `text` into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Turn a token window back into text.
    ///
    /// A window may start or end inside a multi-byte character; such partial
    /// characters are dropped rather than failing the whole window.
    fn decode(&self, tokens: &[u32]) -> String;
}

/// The `cl100k_base` BPE encoding.
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    pub fn new() -> Result<Self, ConfigurationError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| {
            ConfigurationError::Invalid(format!("Failed to load cl100k_base tokenizer: {e}"))
        })?;
        Ok(Self { bpe })
    }

    fn try_decode(&self, tokens: &[u32]) -> Option<String> {
        let ranks: Vec<_> = tokens.iter().map(|&t| t as _).collect();
        self.bpe.decode(ranks).ok()
    }
}

impl Tokenizer for Cl100kTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_with_special_tokens(text)
            .into_iter()
            .map(|t| t as u32)
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        if let Some(text) = self.try_decode(tokens) {
            return text;
        }

        // A UTF-8 sequence spans at most 4 bytes, so at most 3 dangling tokens per edge.
        for trim in 1..=6usize {
            for lead in 0..=trim.min(3) {
                let trail = trim - lead;
                if trail > 3 || lead + trail >= tokens.len() {
                    continue;
                }
                if let Some(text) = self.try_decode(&tokens[lead..tokens.len() - trail]) {
                    return text;
                }
            }
        }

        tokens
            .iter()
            .filter_map(|&t| self.try_decode(&[t]))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Tokenizer;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// One token per whitespace-separated word; decoding joins with a space.
    #[derive(Default)]
    pub struct WordTokenizer {
        vocab: Mutex<(HashMap<String, u32>, Vec<String>)>,
    }

    impl Tokenizer for WordTokenizer {
        fn encode(&self, text: &str) -> Vec<u32> {
            let mut guard = self.vocab.lock().unwrap();
            let (ids, words) = &mut *guard;
            text.split_whitespace()
                .map(|word| {
                    *ids.entry(word.to_string()).or_insert_with(|| {
                        words.push(word.to_string());
                        (words.len() - 1) as u32
                    })
                })
                .collect()
        }

        fn decode(&self, tokens: &[u32]) -> String {
            let guard = self.vocab.lock().unwrap();
            tokens
                .iter()
                .map(|&t| guard.1[t as usize].as_str())
                .collect::<Vec<_>>()
                .join(" ")
        }
    }
}
