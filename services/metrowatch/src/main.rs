//! MetroWatch CLI
//!
//! Command-line interface for the metro status notifier.

use std::path::PathBuf;

use clap::Parser;
use metrowatch::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "metrowatch")]
#[command(about = "Announces metro outages and recoveries")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Status server port (overrides config file)
    #[arg(long)]
    status_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Decide and record as usual, but only log the notifications
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, status_port={:?}, log_level={:?}, dry_run={}",
        args.config,
        args.status_port,
        args.log_level,
        args.dry_run
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    config.resolve_secrets()?;

    if let Some(status_port) = args.status_port {
        config.status.port = status_port;
    }
    if args.dry_run {
        config.notifications.enabled = false;
    }

    config.validate()?;

    tracing::info!("Starting metrowatch service");
    tracing::debug!(
        "Feed: {}, notifiers: {}, notifications enabled: {}",
        config.feed.url,
        config.notifications.notifiers.len(),
        config.notifications.enabled
    );

    metrowatch::run(config).await?;

    Ok(())
}
