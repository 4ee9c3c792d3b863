//! Reclaim CLI entry point

use clap::{Parser, Subcommand};
use reclaim_indexer::ReclaimConfig;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "reclaim")]
#[command(about = "Find unreferenced assets and the space they hold", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Asset root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or restore) the index and print a summary
    Index,
    /// Show the folders holding the most reclaimable bytes
    Report {
        /// Number of folders to list
        #[arg(short, long, default_value = "20")]
        top: usize,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Keep the index live while files change
    Watch,
    /// Clear the cache
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout stays clean for reports
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reclaim={}", log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Reclaim v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Asset root: {}", cli.root.display());

    match cli.command {
        Commands::Index => {
            let config = ReclaimConfig::load(&cli.root)?;
            commands::index(cli.root, config).await
        }
        Commands::Report { top, json } => {
            let config = ReclaimConfig::load(&cli.root)?;
            commands::report(cli.root, config, top, json).await
        }
        Commands::Watch => {
            let config = ReclaimConfig::load(&cli.root)?;
            commands::watch(cli.root, config).await
        }
        Commands::Clear => {
            commands::clear(cli.root)
        }
        Commands::Version => {
            println!("Reclaim v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
