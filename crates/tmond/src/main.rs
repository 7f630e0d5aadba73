//! tmond — the traffic monitor daemon.
//!
//! Single binary that assembles the monitor's availability core:
//! - CRStates store (local availability view)
//! - Peer pollers + peer-view cache
//! - Publication API (axum)
//!
//! # Usage
//!
//! ```text
//! tmond run --config /etc/tmon/tmond.toml
//! tmond inspect /var/lib/tmon/crstates.json
//! ```

mod config;
mod inspect;
mod monitor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tmond", about = "Traffic monitor daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor: serve local availability and poll peers.
    Run {
        /// Path to tmond.toml.
        #[arg(long, short, default_value = "/etc/tmon/tmond.toml")]
        config: PathBuf,
    },

    /// Decode a persisted CRStates snapshot and print its contents.
    Inspect {
        /// Snapshot file (JSON wire format).
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tmond=debug,tmon=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => monitor::run_monitor(config).await,
        Command::Inspect { file } => inspect::inspect(&file),
    }
}
