//! Token counting and sentence chunking for ingested text

use anyhow::Result;
use tiktoken_rs::CoreBPE;

/// Chunk size used when none is configured
pub const DEFAULT_MAX_TOKENS: usize = 500;

const SENTENCE_BREAK: &str = ". ";

/// Splits long texts into sentence-aligned chunks of at most `max_tokens` cl100k tokens
pub struct Chunker {
    bpe: CoreBPE,
    max_tokens: usize,
}

impl Chunker {
    /// Load the cl100k_base encoding. Blocking and fairly expensive; build once per run.
    pub fn new(max_tokens: usize) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| anyhow::anyhow!("Failed to load cl100k_base tokenizer: {}", e))?;
        Ok(Self {
            bpe,
            max_tokens: max_tokens.max(1),
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Number of tokens in `text`; blank text counts as zero
    pub fn count(&self, text: &str) -> usize {
        if text.trim().is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Text within the limit comes back whole, longer text is split on sentence breaks
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if self.count(text) <= self.max_tokens {
            return vec![text.to_string()];
        }
        self.split_sentences(text)
    }

    /// Every returned chunk counts at most `max_tokens`.
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for sentence in text.split(SENTENCE_BREAK) {
            if sentence.trim().is_empty() {
                continue;
            }

            // A sentence that cannot fit any chunk closes the current one and is dropped.
            if self.count(&join_sentences(&[sentence])) > self.max_tokens {
                if !current.is_empty() {
                    chunks.push(join_sentences(&current));
                    current.clear();
                }
                continue;
            }

            current.push(sentence);
            if current.len() > 1 && self.count(&join_sentences(&current)) > self.max_tokens {
                current.pop();
                chunks.push(join_sentences(&current));
                current.clear();
                current.push(sentence);
            }
        }

        if !current.is_empty() {
            chunks.push(join_sentences(&current));
        }
        chunks
    }
}

fn join_sentences(sentences: &[&str]) -> String {
    format!("{}.", sentences.join(SENTENCE_BREAK).trim_end_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_does_not_double_the_final_period() {
        assert_eq!(join_sentences(&["one", "two."]), "one. two.");
        assert_eq!(join_sentences(&["alone"]), "alone.");
    }
}
