//! Kolosal Pipeline - Main Entry Point
//!
//! Trains, evaluates and persists the classification pipeline, or scores new data.

use clap::Parser;
use kolosal_pipeline::cli::{cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_pipeline=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Predict { output }) => {
            cmd_predict(&cli.config, output.as_deref())?;
        }
        Some(Commands::Train) | None => {
            cmd_train(&cli.config)?;
        }
    }

    Ok(())
}
