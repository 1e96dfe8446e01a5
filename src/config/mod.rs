//! Configuration module for Coachloop.
//!
//! Handles loading application settings, the selector table and tone data.

mod prompts;
mod settings;

pub use prompts::{
    build_system_message, render, SessionStep, ToneData, GENERIC_PREAMBLE,
    GROUNDED_USER_TEMPLATE,
};
pub use settings::{
    AgentPaths, AgentSettings, ChunkingSettings, CoachSettings, EmbeddingSettings,
    GeneralSettings, RagSettings, ServerSettings, Settings, DEFAULT_SELECTORS,
};
