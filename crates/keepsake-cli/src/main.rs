//! Keepsake CLI
//!
//! Command-line interface for keepsake - point-in-time snapshots of links.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keepsake_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "keepsake")]
#[command(about = "Keepsake - capture and keep snapshots of the links you save")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture and inspect snapshots
    #[command(alias = "snap")]
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// Capture the content behind a URL
    Capture {
        /// URL to capture
        url: String,
        /// Link to attach the snapshot to (UUID; defaults to one derived from the URL)
        #[arg(short, long)]
        link: Option<String>,
        /// Compression: none, gzip or zstd (defaults to config)
        #[arg(short, long)]
        compression: Option<String>,
        /// Store a new snapshot even if the content has not changed
        #[arg(short, long)]
        force: bool,
    },
    /// List snapshots of a link, most recent first
    #[command(alias = "ls")]
    List {
        /// Link UUID, or the URL it was captured from
        link: String,
    },
    /// Show snapshot metadata
    Show {
        /// Snapshot ID
        id: i64,
    },
    /// Write the original (decompressed) content
    Raw {
        /// Snapshot ID
        id: i64,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the content if it can be displayed inline (HTML, text, images)
    Render {
        /// Snapshot ID
        id: i64,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a snapshot
    #[command(alias = "rm")]
    Delete {
        /// Snapshot ID
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (see `keepsake config show`)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Config { command } => handle_config_command(command, config_path, &output),
        Commands::Snapshot { command } => {
            let config = Config::load_with_cli_override(config_path)
                .context("Failed to load configuration")?;
            init_logging(&config);
            handle_snapshot_command(command, &config, &output).await
        }
    }
}

async fn handle_snapshot_command(
    command: SnapshotCommands,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        SnapshotCommands::Capture {
            url,
            link,
            compression,
            force,
        } => commands::snapshot::capture(config, url, link, compression, force, output).await,
        SnapshotCommands::List { link } => commands::snapshot::list(config, link, output),
        SnapshotCommands::Show { id } => commands::snapshot::show(config, id, output),
        SnapshotCommands::Raw { id, output: path } => {
            commands::snapshot::raw(config, id, path, output)
        }
        SnapshotCommands::Render { id, output: path } => {
            commands::snapshot::render(config, id, path, output)
        }
        SnapshotCommands::Delete { id, yes } => commands::snapshot::delete(config, id, yes, output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging when KEEPSAKE_LOG is set (e.g. `KEEPSAKE_LOG=debug`)
///
/// Logs go to `log_file` from config if set, otherwise to stderr.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("KEEPSAKE_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!(
        "keepsake_core={},keepsake_cli={}",
        log_level, log_level
    ));

    match config.log_file {
        Some(ref log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };

            // Ignore error if already initialized
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
