mod client;
mod commands;
mod config;
mod discovery;
mod enrich;
mod pipeline;
mod segment;
mod snapshot;
mod summary;
mod types;

#[cfg(test)]
mod testing;

use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process;
use thiserror::Error;
use tracing_subscriber::{filter::LevelFilter, fmt};

#[derive(Parser)]
#[command(name = "agents-census")]
#[command(about = "Finds every public repository with an AGENTS.md and snapshots it for the dashboard", long_about = None)]
#[command(version)]
pub struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search GitHub, resolve repository details and write the snapshot
    Collect {
        /// Snapshot file to replace
        #[arg(short, long, default_value = "public/data.json", value_hint = ValueHint::FilePath)]
        output: PathBuf,
        /// Config file (defaults to ~/.config/agents-census/config.json)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Smallest AGENTS.md size in bytes to search
        #[arg(long)]
        min_size: Option<u64>,
        /// Largest AGENTS.md size in bytes to search
        #[arg(long)]
        max_size: Option<u64>,
    },
    /// Print aggregate numbers for an existing snapshot
    Summary {
        #[arg(default_value = "public/data.json", value_hint = ValueHint::FilePath)]
        path: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Transport(#[from] client::TransportError),
    #[error(transparent)]
    Snapshot(#[from] snapshot::SnapshotError),
    #[error("invalid size range: min {min} is greater than max {max}")]
    InvalidRange { min: u64, max: u64 },
}

fn log_level(cli: &Cli) -> LevelFilter {
    if cli.quiet {
        return LevelFilter::WARN;
    }
    match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        None => {
            let _ = Cli::command().print_help();
            println!();
        }
        Some(Commands::Collect {
            output,
            config,
            min_size,
            max_size,
        }) => commands::collect_command(commands::CollectArgs {
            output: &output,
            config: config.as_deref(),
            min_size,
            max_size,
        })?,
        Some(Commands::Summary { path }) => commands::summary_command(&path)?,
        Some(Commands::Completions { shell }) => commands::generate_completions(shell),
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(log_level(&cli));

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "fatal");
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
