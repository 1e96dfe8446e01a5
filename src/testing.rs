//! Scripted capabilities for exercising the pipeline without network access.
//!
//! Compiled for unit tests and, through the `testing` feature, for `tests/`.

use crate::completion::{ChatMessage, Completer};
use crate::embedding::Embedder;
use crate::error::{CoachError, Result};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Embedder with fixed vectors, scripted failures and delays.
///
/// Texts without an explicit vector get a deterministic bag-of-words vector.
pub struct ScriptedEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fail_on: Vec<String>,
    delays: Vec<(String, Duration)>,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            fail_on: Vec::new(),
            delays: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Return `vector` for exactly `text`.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail every text containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    /// Sleep before answering texts containing `needle`.
    pub fn with_delay(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder returns for `text` when it succeeds.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(vector) = self.vectors.get(text) {
            return vector.clone();
        }

        let mut vector = vec![0.0; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % self.dimension as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .delays
            .iter()
            .filter(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, d)| *d)
            .max();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on.iter().any(|needle| text.contains(needle.as_str())) {
            return Err(CoachError::Embedding(format!("scripted failure for {:?}", text)));
        }

        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "scripted-embedder"
    }
}

/// Completer that answers with a fixed reply (or fails) and records every request.
pub struct ScriptedCompleter {
    reply: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompleter {
    /// Always answer `reply`.
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fail.
    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every message list received, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The most recent message list received.
    pub fn last_request(&self) -> Option<Vec<ChatMessage>> {
        self.requests().pop()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(messages.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.reply
            .clone()
            .ok_or_else(|| CoachError::Completion("scripted failure".to_string()))
    }
}
