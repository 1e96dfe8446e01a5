//! CLI module for Coachloop.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{content_preview, Output};

use clap::{Parser, Subcommand};

/// Coachloop - retrieval-grounded coaching assistant
///
/// Builds per-agent vector indexes from text corpora, answers questions grounded
/// in the nearest chunk, and runs a scripted coaching conversation.
#[derive(Parser, Debug)]
#[command(name = "coachloop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check API configuration, selectors and index files
    Doctor,

    /// Build the index for a selector from a folder of .txt files
    Index {
        /// Selector to build (e.g. negotiation, presentation, behavior)
        #[arg(required_unless_present = "all")]
        selector: Option<String>,

        /// Folder of .txt documents (defaults to the selector's source_dir)
        folder: Option<String>,

        /// Build every selector that has a source_dir configured
        #[arg(long, conflicts_with_all = ["selector", "folder"])]
        all: bool,
    },

    /// Ask a question answered from a selector's corpus
    Ask {
        /// Selector whose index grounds the answer
        selector: String,

        /// The question to ask
        question: String,

        /// Show which chunk grounded the answer
        #[arg(short, long)]
        sources: bool,
    },

    /// Show the nearest chunks for a query without generating an answer
    Search {
        /// Selector to search
        selector: String,

        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// Show what a selector's index contains
    Inspect {
        /// Selector to inspect
        selector: String,

        /// Number of metadata entries to print
        #[arg(short = 'n', long, default_value = "5")]
        entries: usize,
    },

    /// Export a selector's embeddings and texts as CSV
    Export {
        /// Selector to export
        selector: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Start an interactive coaching session with Joel
    Chat,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file if none exists
    Init,
}
