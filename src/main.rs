//! EventRelay - Kafka event-change relay
//!
#![doc = "EventRelay - Kafka event-change relay"]
#![doc = "Main entry point for the EventRelay application."]

use anyhow::Result;

use eventrelay::cli::{Cli, Commands};
use eventrelay::commands;
use eventrelay::config::Config;
use eventrelay::logging::init_logging;
use eventrelay::telemetry::init_metrics_exporter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/eventrelay.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    init_logging(&config.logging)?;

    // Execute command
    match cli.command {
        Commands::Run { .. } => {
            tracing::info!("Starting relay mode");
            init_metrics_exporter();
            commands::run::run_relay(config).await?;
            Ok(())
        }
        Commands::Decode { file } => {
            tracing::debug!("Decoding a single payload");
            commands::decode::run_decode(file)?;
            Ok(())
        }
    }
}
