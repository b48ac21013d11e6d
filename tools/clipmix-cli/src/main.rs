//! ClipMix CLI — Render every combination of lead, middle, and body clips.
//!
//! Usage:
//!   clipmix render [INPUTS]    Render all combinations into the export directory
//!   clipmix plan [INPUTS]      Print the ffmpeg invocations without running them
//!   clipmix check              Check that ffmpeg and ffprobe are available
//!   clipmix config [--init]    Show or write the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clipmix_common::config::AppConfig;

mod commands;

use commands::CatalogArgs;

#[derive(Parser)]
#[command(
    name = "clipmix",
    about = "Batch-render clip combinations with ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/clipmix/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every combination into the export directory
    Render {
        #[command(flatten)]
        inputs: CatalogArgs,

        /// Export directory (cleared before rendering)
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the combinations and ffmpeg arguments without rendering
    Plan {
        #[command(flatten)]
        inputs: CatalogArgs,

        /// Export directory used for output paths
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Print the plans as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the external tools are available
    Check,

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,

        /// Overwrite an existing configuration file
        #[arg(long, requires = "init")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    clipmix_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Render {
            inputs,
            export_dir,
            json,
        } => {
            if let Some(dir) = export_dir {
                config.export_dir = dir;
            }
            commands::render::run(config, inputs, json).await
        }
        Commands::Plan {
            inputs,
            export_dir,
            json,
        } => {
            if let Some(dir) = export_dir {
                config.export_dir = dir;
            }
            commands::plan::run(&config, inputs, json)
        }
        Commands::Check => commands::check::run(&config),
        Commands::Config { init, force } => commands::config::run(&config, cli.config, init, force),
    }
}
