//! EntiStore CLI
//!
//! Command-line tools for EntiStore log files.
//!
//! # Commands
//!
//! - `inspect` - Display log statistics and entity counts per type
//! - `dump` - Print every stored envelope as one JSON line
//! - `compact` - Rewrite the log keeping only live entities
//! - `verify` - Decode every stored envelope and report failures

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EntiStore command-line tools.
#[derive(Parser)]
#[command(name = "entistore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display log statistics and entity counts per type
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print stored envelopes, one JSON document per line
    Dump {
        /// Maximum number of envelopes to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only print entities of this type
        #[arg(short = 't', long = "type")]
        entity_type: Option<String>,
    },

    /// Rewrite the log keeping only live entities
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Decode every stored envelope
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Dump { limit, entity_type } => {
            let path = cli.path.ok_or("Log path required for dump")?;
            commands::dump::run(&path, limit, entity_type.as_deref())?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Log path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Version => {
            println!("EntiStore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("EntiStore Core v{}", entistore_core::VERSION);
        }
    }

    Ok(())
}
