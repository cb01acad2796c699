//! # Subscriber Configuration
//!
//! Command-line flags with environment fallbacks.
//!
//! | Flag | Env | Default |
//! |------|-----|---------|
//! | `--project` | `SCAN_PROJECT` | `test-project` |
//! | `--subscription` | `SCAN_SUBSCRIPTION` | `scan-sub` |
//! | `--db-path` | `SCAN_DB_PATH` | `/data/subscriber.db` |
//! | `--busy-timeout-ms` | `SCAN_BUSY_TIMEOUT_MS` | `3000` |
//! | `--concurrency` | `SCAN_CONCURRENCY` | `10` |
//! | `--max-deliveries` | `SCAN_MAX_DELIVERIES` | `5` |
//! | `--max-backlog` | `SCAN_MAX_BACKLOG` | `1024` |
//! | `--input` | `SCAN_INPUT` | stdin |
//! | `--metrics-file` | `SCAN_METRICS_FILE` | none |

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use scan_bus::{QueueConfig, SubscriptionId};
use scan_ingest::StoreConfig;

use crate::feed::FeedSource;

/// Scan subscriber: keeps the latest scan result per (ip, port, service).
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "scan-subscriber")]
#[command(about = "Consume scan result events and upsert the latest state per endpoint")]
pub struct SubscriberConfig {
    /// Project owning the subscription. Only labels logs: the in-process
    /// queue has no project scoping.
    #[arg(long, env = "SCAN_PROJECT", default_value = "test-project")]
    pub project: String,

    /// Subscription to consume
    #[arg(long, env = "SCAN_SUBSCRIPTION", default_value = scan_bus::DEFAULT_SUBSCRIPTION)]
    pub subscription: String,

    /// SQLite database file
    #[arg(long, env = "SCAN_DB_PATH", default_value = scan_ingest::DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// How long a write waits on a locked database before failing
    #[arg(long, env = "SCAN_BUSY_TIMEOUT_MS", default_value_t = 3000)]
    pub busy_timeout_ms: u64,

    /// Messages processed at once
    #[arg(
        long,
        env = "SCAN_CONCURRENCY",
        default_value_t = scan_ingest::DEFAULT_CONCURRENCY as u32,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub concurrency: u32,

    /// Deliveries per message before it is dead-lettered
    #[arg(long, env = "SCAN_MAX_DELIVERIES", default_value_t = scan_bus::DEFAULT_MAX_DELIVERIES)]
    pub max_deliveries: u32,

    /// Queued messages at which reading the input pauses
    #[arg(long, env = "SCAN_MAX_BACKLOG", default_value_t = scan_bus::DEFAULT_MAX_BACKLOG)]
    pub max_backlog: usize,

    /// Newline-delimited scan events to publish ("-" for stdin)
    #[arg(long, env = "SCAN_INPUT")]
    pub input: Option<PathBuf>,

    /// Write Prometheus text-format metrics here on shutdown
    #[arg(long, env = "SCAN_METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,
}

impl SubscriberConfig {
    pub fn subscription_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.subscription.clone())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.db_path.clone())
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    /// In-flight limit for the delivery adapter.
    pub fn concurrency(&self) -> usize {
        usize::try_from(self.concurrency).unwrap_or(scan_ingest::MAX_CONCURRENCY)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_deliveries: self.max_deliveries,
            max_backlog: self.max_backlog,
        }
    }

    pub fn feed_source(&self) -> FeedSource {
        match &self.input {
            Some(path) if path.as_os_str() != "-" => FeedSource::File(path.clone()),
            _ => FeedSource::Stdin,
        }
    }
}
