//! Cross-crate pipeline scenarios.

mod delivery;
mod durability;
mod ordering;

pub mod fixtures {
    //! Shared builders for the integration scenarios.

    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use scan_bus::{InMemoryScanQueue, QueueConfig, SubscriptionId};
    use scan_ingest::{
        DeliveryAdapter, EventProcessor, RunSummary, ScanEnvelope, ScanStore, TimeSource,
    };
    use tokio::sync::watch;

    /// Clock that advances one second per reading, starting at `start`.
    pub struct StepClock(AtomicI64);

    impl StepClock {
        pub fn starting_at(start: i64) -> Self {
            Self(AtomicI64::new(start))
        }
    }

    impl TimeSource for StepClock {
        fn now(&self) -> i64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    pub fn subscription() -> SubscriptionId {
        SubscriptionId::from("scan-sub")
    }

    /// Queue with one subscription and the given delivery limit.
    pub fn queue(max_deliveries: u32) -> InMemoryScanQueue {
        let queue = InMemoryScanQueue::with_config(QueueConfig {
            max_deliveries,
            ..QueueConfig::default()
        });
        queue.create_subscription(subscription());
        queue
    }

    pub fn publish(queue: &InMemoryScanQueue, envelope: &ScanEnvelope) {
        queue
            .publish(envelope.encode().expect("envelope encodes"))
            .expect("queue open");
    }

    /// Close the queue and run the delivery adapter until it drains.
    pub async fn drain<S>(
        queue: &InMemoryScanQueue,
        store: Arc<S>,
        concurrency: usize,
    ) -> RunSummary
    where
        S: ScanStore + 'static,
    {
        queue.close();
        let processor = EventProcessor::with_time_source(store, StepClock::starting_at(1_000));
        let adapter = DeliveryAdapter::new(Arc::new(processor)).with_concurrency(concurrency);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let subscription = queue.subscribe(&subscription()).expect("subscription exists");
        adapter.run(subscription, shutdown_rx).await
    }
}
