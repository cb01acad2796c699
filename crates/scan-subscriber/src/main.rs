//! # Scan Subscriber
//!
//! Entry point: parse configuration, initialize telemetry, run until the
//! feed is exhausted or Ctrl+C.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use scan_subscriber::{SubscriberConfig, SubscriberRuntime};
use scan_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = SubscriberConfig::parse();

    let telemetry_config = TelemetryConfig::from_env();
    let _telemetry = init_telemetry(&telemetry_config).context("failed to initialize telemetry")?;

    info!(
        service = %telemetry_config.service_name,
        project = %config.project,
        subscription = %config.subscription,
        db_path = %config.db_path.display(),
        concurrency = config.concurrency,
        max_deliveries = config.max_deliveries,
        max_backlog = config.max_backlog,
        "Starting scan subscriber"
    );

    let runtime = SubscriberRuntime::new(config)?;
    let report = runtime.run().await?;

    if report.queue.dead_lettered > 0 {
        tracing::warn!(
            dead_lettered = report.queue.dead_lettered,
            "Some messages could not be processed"
        );
    }

    Ok(())
}
