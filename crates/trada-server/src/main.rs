//! Teletrada server binary.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trada_core::{Config, SystemClock};
use trada_server::{Scheduler, TradaServer};

#[derive(Debug, Parser)]
#[command(name = "trada-server", about = "Teletrada portfolio and simulation server")]
struct Args {
    /// Config file stem or path (defaults to `teletrada`).
    #[arg(long)]
    config: Option<String>,

    /// Use the simulated exchange.
    #[arg(long)]
    use_mock: bool,

    /// Replay price snapshots from this directory at start-up.
    #[arg(long)]
    load_prices_dir: Option<PathBuf>,

    /// Seconds between scheduled updates.
    #[arg(long)]
    update_freq_secs: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load()?,
    };
    config.use_mock |= args.use_mock;
    config.verbose |= args.verbose;
    if let Some(dir) = args.load_prices_dir {
        config.load_prices_dir = Some(dir);
    }
    if let Some(secs) = args.update_freq_secs {
        config.update_frequency_secs = secs;
    }
    config.validate()?;

    let default_filter = if config.verbose {
        "trada_server=debug,trada_core=debug,backtester=debug"
    } else {
        "trada_server=info,trada_core=info,backtester=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Teletrada server");

    if !config.use_mock {
        bail!("No live exchange client is configured; run with --use-mock");
    }

    let frequency = config.update_frequency();
    let server = Arc::new(TradaServer::simulated(config, Arc::new(SystemClock)));
    server.init().await?;

    let scheduler = Scheduler::start(Arc::clone(&server), frequency);
    info!(
        symbols = server.status().archive.total_symbols,
        "Server ready"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.stop().await;

    Ok(())
}
