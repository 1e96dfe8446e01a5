//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod export;
mod index;
mod inspect;
mod search;
mod serve;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use export::{run_export, write_embeddings_csv};
pub use index::run_index;
pub use inspect::run_inspect;
pub use search::run_search;
pub use serve::{build_router, run_serve, AppState};

use crate::completion::OpenAICompleter;
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::error::Result;
use crate::rag::Responder;
use std::sync::Arc;
use std::time::Duration;

/// Responder backed by the OpenAI embedding and completion APIs.
fn openai_responder(settings: &Settings) -> Result<Responder> {
    let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
    let completer = Arc::new(OpenAICompleter::new(
        &settings.rag.model,
        Duration::from_secs(settings.rag.request_timeout_secs),
    )?);
    Ok(Responder::new(settings, embedder, completer))
}

/// Completer configured for the coaching dialogue.
fn coach_completer(settings: &Settings) -> Result<OpenAICompleter> {
    Ok(OpenAICompleter::new(
        &settings.coach.model,
        Duration::from_secs(settings.rag.request_timeout_secs),
    )?
    .with_temperature(settings.coach.temperature)
    .with_max_tokens(settings.coach.max_tokens))
}
