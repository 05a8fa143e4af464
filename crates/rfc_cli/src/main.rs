//! rfcmgr
//!
//! Remote feature control sync agent. Meant to be run periodically by an
//! external scheduler; each `sync` invocation is one cycle.
//!
//! # Commands
//!
//! - `sync` - Fetch the feature manifest and reconcile the parameter store
//! - `status` - Show the persisted sync state

mod client;
mod commands;
mod credentials;
mod device;
mod experience;
mod settings;
mod telemetry;

use clap::{Parser, Subcommand};
use settings::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Remote feature control sync agent.
#[derive(Parser)]
#[command(name = "rfcmgr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle
    Sync {
        /// Never present a client certificate
        #[arg(long)]
        no_mtls: bool,

        /// Feature artifact directory
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Fetch attempts per cycle
        #[arg(long)]
        attempts: Option<u32>,
    },

    /// Show the persisted sync state
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            no_mtls,
            artifact_dir,
            attempts,
        } => {
            if artifact_dir.is_some() {
                settings.artifact_dir = artifact_dir;
            }
            if attempts.is_some() {
                settings.retry.attempts = attempts;
            }
            commands::sync::run(&settings, no_mtls)?;
        }
        Commands::Status { format } => {
            commands::status::run(&settings, &format)?;
        }
        Commands::Version => {
            println!("rfcmgr v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
