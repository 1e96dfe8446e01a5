//! Word-window chunking for corpus documents.
//!
//! Documents are split on whitespace into overlapping windows of at most
//! `max_words` words. Consecutive windows share `overlap_words` words so that
//! context spanning a split boundary survives in at least one chunk.

use crate::config::ChunkingSettings;
use serde::{Deserialize, Serialize};

/// A chunk of a source document, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Source filename (no directory).
    pub filename: String,
    /// Chunk text.
    pub text: String,
    /// Position of this chunk within its document.
    pub ordinal: usize,
}

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum words per chunk.
    pub max_words: usize,
    /// Words shared by consecutive chunks.
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: 750,
            overlap_words: 150,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            max_words: settings.max_words,
            overlap_words: settings.overlap_words,
        }
    }
}

impl ChunkingConfig {
    /// Words the window start advances per step. Never zero.
    pub fn stride(&self) -> usize {
        self.max_words.saturating_sub(self.overlap_words).max(1)
    }
}

/// Split `text` into overlapping word windows.
///
/// A document of at most `max_words` words comes back as a single chunk equal
/// to the trimmed input. Longer documents produce windows joined by single
/// spaces; the last window ends exactly at the last word. Empty or
/// whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.is_empty() {
        return Vec::new();
    }

    if words.len() <= config.max_words.max(1) {
        return vec![text.trim().to_string()];
    }

    let max_words = config.max_words.max(1);
    let stride = config.stride();
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + max_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }

    chunks
}

/// Chunker bound to a fixed policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordChunker {
    config: ChunkingConfig,
}

impl WordChunker {
    /// Create a chunker with the given policy.
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// The policy in use.
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk one document, tagging each chunk with its filename and ordinal.
    pub fn chunk_document(&self, filename: &str, text: &str) -> Vec<DocumentChunk> {
        chunk_text(text, &self.config)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| DocumentChunk {
                filename: filename.to_string(),
                text,
                ordinal,
            })
            .collect()
    }
}
