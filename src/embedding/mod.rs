//! Embedding capability: text in, fixed-dimension vector out.

mod openai;

pub use openai::{OpenAIEmbedder, DEFAULT_DIMENSIONS, DEFAULT_MODEL};

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
///
/// Failures are reported as errors; callers decide whether a failure drops a
/// chunk (indexing) or skips retrieval (querying). Implementations never
/// substitute a made-up vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Model identifier recorded alongside built indexes.
    fn model(&self) -> &str;
}
