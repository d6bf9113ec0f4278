//! ## grenverk-cli
//! **Operator interface for the index workspace**
//!
//! Looks up addresses against the configured access list, drives a timer set
//! through an event loop and reports allocation statistics of the indexes.

use clap::Parser;
use grenverk_config::GrenverkConfig;
use grenverk_telemetry::logging::IndexLogger;
use grenverk_telemetry::metrics::IndexMetrics;

mod commands;
mod lookup;
mod stats;
mod timer_loop;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GrenverkConfig::load_from_path(path)?,
        None => GrenverkConfig::load()?,
    };

    IndexLogger::init(&config.telemetry.log_level)
        .map_err(|err| anyhow::anyhow!("logger setup failed: {err}"))?;
    let metrics = IndexMetrics::with_registration(config.telemetry.metrics)?;

    commands::run_command(cli, config, &metrics).await
}
