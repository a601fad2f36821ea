//! Command-line interface for MMIF files.
//!
//! This CLI tool provides commands for preparing and trimming pipeline input:
//! - source: Build a source file listing media documents
//! - rewind: Drop the most recent views from a file
//! - validate: Check a file loads cleanly
//!
//! Configuration via environment:
//! - MMIF_VALIDATE: Validate payloads on load (default: true)
//! - MMIF_FUZZY_TYPES: Match vocabulary types across adjacent versions (default: true)
//! - MMIF_AUTOGENERATE_CAPITAL: Generate capital annotations on write (default: true)
//! - MMIF_LOG_LEVEL: Logging level (default: info)

mod commands;

use clap::{Parser, Subcommand};
use mmif_core::MmifConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use commands::{rewind::RewindArgs, source::SourceArgs, validate::ValidateArgs};

/// MMIF command-line tools
///
/// Files are written as JSON to stdout unless --output is given. The --human
/// flag adds a formatted summary on stderr.
#[derive(Parser)]
#[command(name = "mmif")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Print human-readable summaries
    #[arg(long, global = true)]
    human: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a source file from TYPE:LOCATION pairs
    Source(SourceArgs),

    /// Remove the most recent views
    Rewind(RewindArgs),

    /// Validate a file
    Validate(ValidateArgs),
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = match MmifConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_level);

    let result = match cli.command {
        Commands::Source(args) => commands::source::execute(&config, cli.human, args),
        Commands::Rewind(args) => commands::rewind::execute(&config, cli.human, args),
        Commands::Validate(args) => commands::validate::execute(&config, cli.human, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
