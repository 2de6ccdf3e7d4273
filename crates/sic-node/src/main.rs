//! SIC node entry point.

use anyhow::Result;
use sic_bus::InMemoryBroker;
use sic_node::{NodeConfig, Pipeline};
use sic_telemetry::{init_logging, TelemetryConfig};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::for_service("sic-node"))?;

    let config = NodeConfig::from_env();
    let run_for = config.run_for;
    info!("===========================================");
    info!("  SIC Node v{}", env!("CARGO_PKG_VERSION"));
    info!("  Host: {}", config.manager.ip);
    info!("===========================================");

    let pipeline = Pipeline::start(Arc::new(InMemoryBroker::new()), config).await?;

    match run_for {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => info!("Run time elapsed"),
                signal = tokio::signal::ctrl_c() => {
                    if let Err(err) = signal {
                        warn!("Ctrl-C handler failed: {}", err);
                    }
                }
            }
        }
        None => {
            info!("Press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    info!("Shutting down");
    pipeline.stop().await;
    Ok(())
}
