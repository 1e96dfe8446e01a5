//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::indexer::{BuildReport, CorpusIndexer};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Run the index command.
pub async fn run_index(
    selector: Option<&str>,
    folder: Option<&str>,
    all: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index) {
        Output::error(&format!("{}", e));
        Output::info("Run 'coachloop doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
    let indexer = CorpusIndexer::new(settings, embedder).with_progress(true);

    if all {
        let results = indexer.build_all().await;
        if results.is_empty() {
            Output::warning("No selector has a source_dir configured.");
            return Ok(());
        }

        let mut failed = 0;
        for (selector, result) in results {
            match result {
                Ok(report) => print_report(&report),
                Err(e) => {
                    failed += 1;
                    Output::error(&format!("{}: {}", selector, e));
                }
            }
        }
        if failed > 0 {
            anyhow::bail!("{} selector(s) failed to build", failed);
        }
        return Ok(());
    }

    let Some(selector) = selector else {
        anyhow::bail!("a selector is required unless --all is given");
    };
    preflight::check_selector(indexer.settings(), selector)?;

    let folder = match folder {
        Some(folder) => Settings::expand_path(folder),
        None => source_dir(indexer.settings(), selector)?,
    };

    Output::info(&format!(
        "Indexing {} from {}",
        selector,
        folder.display()
    ));

    match indexer.build_index(&folder, selector).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to build index for {}: {}", selector, e));
            Err(e.into())
        }
    }
}

fn source_dir(settings: &Settings, selector: &str) -> Result<PathBuf> {
    settings
        .agent_paths(selector)
        .and_then(|paths| paths.source_dir)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no folder given and agents.{}.source_dir is not configured",
                selector
            )
        })
}

fn print_report(report: &BuildReport) {
    Output::success(&format!(
        "Indexed {} of {} chunks from {} documents for {}",
        report.indexed, report.chunks, report.documents, report.selector
    ));
    Output::kv("Dimension", &report.dimension.to_string());
    Output::kv("Index", &report.index_path.display().to_string());
    Output::kv("Metadata", &report.metadata_path.display().to_string());

    if !report.failures.is_empty() {
        Output::warning(&format!("{} chunk(s) dropped:", report.failures.len()));
        for failure in &report.failures {
            Output::list_item(&format!(
                "{} chunk {}: {}",
                failure.filename, failure.ordinal, failure.reason
            ));
        }
    }
    for file in &report.skipped_files {
        Output::warning(&format!("Skipped unreadable file {}", file));
    }
}
