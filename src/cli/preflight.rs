//! Pre-flight checks before operations that call the OpenAI API.
//!
//! Validates configuration up front so a command fails before doing any work
//! instead of midway through an index build.

use crate::config::Settings;
use crate::error::{CoachError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Building an index needs the API key and a source folder.
    Index,
    /// Answering, searching and coaching need the API key.
    Query,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Index | Operation::Query => check_api_key(),
    }
}

/// Ensure `selector` is configured.
pub fn check_selector(settings: &Settings, selector: &str) -> Result<()> {
    if settings.agent_paths(selector).is_some() {
        return Ok(());
    }
    Err(CoachError::NotFound(format!(
        "{} (configured selectors: {})",
        selector,
        settings.selectors().join(", ")
    )))
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(CoachError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(CoachError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}
