use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use switchmate_cli::cli::{Cli, Commands};
use switchmate_cli::commands::{cmd_scan, cmd_set, cmd_status, cmd_watch};
use switchmate_cli::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_validated(cli.config.as_deref()).context("Invalid configuration")?;

    match cli.command {
        Commands::Scan {
            timeout,
            all,
            format,
        } => cmd_scan(timeout, all, format).await,
        Commands::Status { device, format } => cmd_status(device, format, &config).await,
        Commands::Set { action, device } => cmd_set(action, device, &config).await,
        Commands::Watch { device, notify } => cmd_watch(device, notify, &config).await,
    }
}
