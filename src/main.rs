//! Coachloop CLI entry point.

use anyhow::Result;
use clap::Parser;
use coachloop::cli::{commands, Cli, Commands};
use coachloop::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_deref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging; -v flags override the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("coachloop={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Index { selector, folder, all } => {
            commands::run_index(selector.as_deref(), folder.as_deref(), *all, settings).await?;
        }

        Commands::Ask {
            selector,
            question,
            sources,
        } => {
            commands::run_ask(selector, question, *sources, settings).await?;
        }

        Commands::Search {
            selector,
            query,
            limit,
        } => {
            commands::run_search(selector, query, *limit, settings).await?;
        }

        Commands::Inspect { selector, entries } => {
            commands::run_inspect(selector, *entries, settings).await?;
        }

        Commands::Export { selector, output } => {
            commands::run_export(selector, output.clone(), settings).await?;
        }

        Commands::Chat => {
            commands::run_chat(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
