//! Tether CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Incremental import tracking and change propagation for model workspaces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace root path (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the workspace and report documents and unresolved imports
    Index,
    /// List the documents to revalidate when the given files change
    Affected {
        /// Changed files, relative to the root
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List import cycles
    Cycles,
    /// Print the resolved import graph in Graphviz DOT format
    Graph,
    /// Watch the workspace and print revalidation plans as files change
    Watch {
        /// Quiet period in milliseconds that closes a batch of edits
        #[arg(long, default_value = "100")]
        debounce_ms: u64,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "tether={0},tether_core={0},tether_engine={0},tether_indexer={0},tether_watcher={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Tether v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Workspace root: {}", cli.root.display());

    match cli.command {
        Commands::Index => commands::index(cli.root, cli.json).await,
        Commands::Affected { files } => commands::affected(cli.root, files, cli.json).await,
        Commands::Cycles => commands::cycles(cli.root, cli.json).await,
        Commands::Graph => commands::graph(cli.root).await,
        Commands::Watch { debounce_ms } => commands::watch(cli.root, debounce_ms).await,
        Commands::Version => {
            println!("Tether v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
