//! Error types for Coachloop.

use thiserror::Error;

/// Library-level error type for Coachloop operations.
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No index configured or persisted for selector: {0}")]
    NotFound(String),

    #[error("Corrupt index for selector '{selector}': {reason}")]
    CorruptIndex { selector: String, reason: String },

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No usable chunks for selector '{0}': every embedding failed or the corpus was empty")]
    EmptyCorpus(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoachError {
    /// Shorthand for a corrupt index/metadata pair.
    pub fn corrupt(selector: &str, reason: impl Into<String>) -> Self {
        CoachError::CorruptIndex {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for Coachloop operations.
pub type Result<T> = std::result::Result<T, CoachError>;
