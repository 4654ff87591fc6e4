//! PlayCut CLI — Command-line interface for project inspection and export.
//!
//! Usage:
//!   playcut validate <PATH>    Validate a project file
//!   playcut info <PATH>        Show project information
//!   playcut export <PATH>      Export a project to video
//!   playcut check              Check engine capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "playcut",
    about = "Timeline media editing engine: preview, composite, export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project file
    Validate {
        /// Path to the project JSON file
        path: PathBuf,
    },

    /// Show project information
    Info {
        /// Path to the project JSON file
        path: PathBuf,
    },

    /// Export a project to video
    Export {
        /// Path to the project JSON file
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output width
        #[arg(long)]
        width: Option<u32>,

        /// Output height
        #[arg(long)]
        height: Option<u32>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Render without encoding (stream structure check only)
        #[arg(long)]
        dry_run: bool,
    },

    /// Check engine capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    playcut_common::logging::init_logging(&playcut_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    match cli.command {
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Info { path } => commands::info::run(path),
        Commands::Export {
            path,
            output,
            width,
            height,
            fps,
            dry_run,
        } => commands::export::run(path, output, width, height, fps, dry_run).await,
        Commands::Check => commands::check::run(),
    }
}
