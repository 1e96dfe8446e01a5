//! Search command implementation.

use super::openai_responder;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    selector: &str,
    query: &str,
    limit: usize,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Query)?;
    preflight::check_selector(&settings, selector)?;

    let responder = openai_responder(&settings)?;

    let spinner = Output::spinner("Searching...");
    let results = responder.search(selector, query, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) if chunks.is_empty() => {
            Output::warning("The index is empty.");
        }
        Ok(chunks) => {
            Output::success(&format!("Found {} results", chunks.len()));
            for chunk in &chunks {
                Output::search_result(
                    chunk.position,
                    &chunk.record.filename,
                    chunk.distance,
                    &chunk.record.text,
                );
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
