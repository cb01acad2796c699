//! # Subscriber Runtime
//!
//! Wires the store, processor, queue and delivery adapter together.
//!
//! ## Startup Sequence
//!
//! 1. Open the SQLite store (creating the file and schema if needed)
//! 2. Create the queue and the configured subscription
//! 3. Start the delivery adapter on the subscription
//! 4. Publish the feed; at end of input, close the queue
//! 5. Wait for the adapter to drain, or for a shutdown signal
//! 6. Write the metrics file, if one is configured

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use scan_bus::{InMemoryScanQueue, QueueStats};
use scan_ingest::{DeliveryAdapter, EventProcessor, RunSummary, ScanStore, SqliteScanStore};
use tokio::sync::watch;
use scan_telemetry::write_metrics;
use tracing::{error, info, warn};

use crate::config::SubscriberConfig;
use crate::feed::{publish_lines, FeedSource};

/// Outcome of one runtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub delivery: RunSummary,
    pub queue: QueueStats,
    pub records: u64,
}

/// The subscriber service.
pub struct SubscriberRuntime {
    config: SubscriberConfig,
    store: Arc<SqliteScanStore>,
    queue: InMemoryScanQueue,
}

impl SubscriberRuntime {
    /// Open the store and set up the subscription.
    pub fn new(config: SubscriberConfig) -> Result<Self> {
        let store_config = config.store_config();
        let store = SqliteScanStore::open(&store_config).with_context(|| {
            format!("failed to open scan database {}", store_config.path.display())
        })?;

        let queue = InMemoryScanQueue::with_config(config.queue_config());
        queue.create_subscription(config.subscription_id());

        Ok(Self {
            config,
            store: Arc::new(store),
            queue,
        })
    }

    pub fn store(&self) -> &Arc<SqliteScanStore> {
        &self.store
    }

    pub fn queue(&self) -> &InMemoryScanQueue {
        &self.queue
    }

    /// Run until the feed is fully processed or Ctrl+C.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until the feed is fully processed or `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let subscription_id = self.config.subscription_id();
        let subscription = self.queue.subscribe(&subscription_id)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let processor = Arc::new(EventProcessor::new(Arc::clone(&self.store)));
        let adapter = DeliveryAdapter::new(processor).with_concurrency(self.config.concurrency());
        let mut delivery =
            tokio::spawn(async move { adapter.run(subscription, shutdown_rx).await });

        let source = self.config.feed_source();
        let queue = self.queue.clone();
        let mut feed = tokio::spawn(async move {
            let result = match source.open().await {
                Ok(reader) => publish_lines(reader, &queue).await,
                Err(e) => Err(e),
            };
            // End of input: let the adapter drain and stop.
            queue.close();
            result
        });

        info!(
            project = %self.config.project,
            subscription = %subscription_id,
            source = %self.config.feed_source(),
            "Subscriber running"
        );

        tokio::pin!(shutdown);
        let summary = tokio::select! {
            summary = &mut delivery => summary.context("delivery task failed")?,
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                feed.abort();
                if shutdown_tx.send(true).is_err() {
                    warn!("Delivery adapter already stopped");
                }
                delivery.await.context("delivery task failed")?
            }
        };

        match (&mut feed).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(error = %e, "Feed failed"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!(error = %e, "Feed task failed"),
        }

        let queue_stats = self.queue.stats(&subscription_id).unwrap_or_default();
        for dead in self.queue.dead_letters(&subscription_id) {
            error!(
                message_id = %dead.id,
                attempts = dead.attempts,
                bytes = dead.data.len(),
                "Message dead-lettered"
            );
        }

        let report = RunReport {
            delivery: summary,
            queue: queue_stats,
            records: self.store.count()?,
        };

        info!(
            acked = report.delivery.acked,
            nacked = report.delivery.nacked,
            dead_lettered = report.queue.dead_lettered,
            records = report.records,
            "Subscriber stopped"
        );

        if let Some(path) = &self.config.metrics_file {
            match write_metrics(path) {
                Ok(()) => info!(path = %path.display(), "Metrics written"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to write metrics"),
            }
        }
        Ok(report)
    }
}
