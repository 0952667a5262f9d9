//! PhotonSla CLI - Command-line interface for Photon print-job tools

pub mod commands;
pub mod progress;

use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "photonsla")]
#[command(about = "PhotonSla: inspect, check and repair Photon SLA print jobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the PhotonSla CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
