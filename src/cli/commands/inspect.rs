//! Inspect command implementation.

use crate::cli::preflight;
use crate::cli::{content_preview, Output};
use crate::config::Settings;
use crate::rag::IndexLoader;
use anyhow::Result;

/// Run the inspect command.
pub async fn run_inspect(selector: &str, entries: usize, settings: Settings) -> Result<()> {
    preflight::check_selector(&settings, selector)?;

    let loader = IndexLoader::new(&settings);
    let agent = match loader.load(selector).await {
        Ok(agent) => agent,
        Err(e) => {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    };
    let pair = &agent.pair;

    Output::header(&format!("Index: {}", selector));
    Output::kv("Vectors", &pair.index.len().to_string());
    Output::kv("Dimension", &pair.index.dimension().to_string());
    Output::kv("Model", &pair.model);
    Output::kv("Built", &pair.built_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());

    let mut files: Vec<&str> = pair.metadata.iter().map(|r| r.filename.as_str()).collect();
    files.dedup();
    Output::kv("Source files", &files.len().to_string());

    match &agent.tone {
        Some(tone) => {
            Output::kv("Purpose", tone.purpose.as_deref().unwrap_or("-"));
            Output::kv("Role", tone.role.as_deref().unwrap_or("-"));
            let steps = tone.step_titles();
            if !steps.is_empty() {
                Output::kv("Session steps", &steps.join(", "));
            }
        }
        None => Output::kv("Tone", "none (generic preamble)"),
    }

    if entries > 0 && !pair.metadata.is_empty() {
        Output::header("Entries");
        for (position, record) in pair.metadata.iter().take(entries).enumerate() {
            Output::list_item(&format!(
                "#{} {}: {}",
                position,
                record.filename,
                content_preview(&record.text, 120)
            ));
        }
    }

    Ok(())
}
