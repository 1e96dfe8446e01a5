//! Coachloop - retrieval-grounded coaching assistant
//!
//! Turns folders of plain-text coaching material into per-agent vector indexes
//! and answers questions grounded in the nearest chunk.
//!
//! # Overview
//!
//! Coachloop allows you to:
//! - Chunk `.txt` documents into overlapping word windows
//! - Embed and persist each agent's corpus as an index/metadata pair
//! - Answer questions grounded in the closest chunk, with fixed fallbacks
//!   when an index, the embedding service or the completion service is unavailable
//! - Run "Joel", a scripted ten-step coaching conversation
//!
//! # Architecture
//!
//! - `config` - Settings, selector table and tone data
//! - `chunking` - Word-window chunker
//! - `embedding` / `completion` - Capability traits and OpenAI implementations
//! - `vector_store` - Flat L2 index and its on-disk format
//! - `indexer` - Corpus indexing pipeline
//! - `rag` - Index loading and grounded responses
//! - `coach` - Scripted coaching dialogue
//!
//! # Example
//!
//! ```rust,no_run
//! use coachloop::completion::OpenAICompleter;
//! use coachloop::config::Settings;
//! use coachloop::embedding::OpenAIEmbedder;
//! use coachloop::rag::Responder;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
//!     let completer = Arc::new(OpenAICompleter::new("gpt-4", Duration::from_secs(60))?);
//!     let responder = Responder::new(&settings, embedder, completer);
//!
//!     let answer = responder.respond("negotiation", "How do I open a salary talk?").await;
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod coach;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod openai;
pub mod rag;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vector_store;

pub use error::{CoachError, Result};
