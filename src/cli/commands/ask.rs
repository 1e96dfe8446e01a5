//! Ask command implementation.

use super::openai_responder;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::{GroundingContext, ResponseStatus};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    selector: &str,
    question: &str,
    sources: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Query) {
        Output::error(&format!("{}", e));
        Output::info("Run 'coachloop doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let responder = openai_responder(&settings)?;

    let spinner = Output::spinner("Searching knowledge base...");
    let response = responder.respond_detailed(selector, question).await;
    spinner.finish_and_clear();

    println!("\n{}\n", response.text);

    if response.status == ResponseStatus::Unavailable {
        Output::info(&format!("Build it first with: coachloop index {} <folder>", selector));
    }

    if sources {
        match &response.context {
            Some(GroundingContext::Retrieved {
                position,
                distance,
                record,
            }) => {
                Output::header("Source");
                Output::search_result(*position, &record.filename, *distance, &record.text);
            }
            Some(GroundingContext::QueryFallback(reason)) => {
                Output::warning(&format!(
                    "No chunk used ({:?}); answered from the question alone.",
                    reason
                ));
            }
            None => {}
        }
        if response.resized {
            Output::warning("Query embedding was resized to match the index dimension.");
        }
    }

    Ok(())
}
