//! # Ordering Scenarios
//!
//! The stored record must end up the same no matter how deliveries are
//! ordered, duplicated or interleaved.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::seq::SliceRandom;
    use scan_ingest::{
        EventProcessor, InMemoryScanStore, ScanEnvelope, ScanIngestApi, ScanKey, ScanStore,
        SqliteScanStore, StoreConfig,
    };

    use crate::integration::fixtures::{drain, publish, queue, StepClock};

    fn key() -> ScanKey {
        ScanKey::new("203.0.113.7", 443, "https")
    }

    #[tokio::test]
    async fn test_newer_then_older_keeps_newer() {
        let queue = queue(5);
        let store = Arc::new(InMemoryScanStore::new());

        publish(&queue, &ScanEnvelope::v2(key(), 100, "hello"));
        publish(&queue, &ScanEnvelope::v2(key(), 50, "stale"));

        let summary = drain(&queue, Arc::clone(&store), 1).await;
        assert_eq!(summary.acked, 2);
        assert_eq!(summary.nacked, 0);

        let stored = store.get(&key()).unwrap().unwrap();
        assert_eq!(stored.response, "hello");
        assert_eq!(stored.scanned_at, 100);
    }

    #[test]
    fn test_either_order_same_final_state() {
        let older = ScanEnvelope::v1(key(), 10, b"first").encode().unwrap();
        let newer = ScanEnvelope::v2(key(), 20, "second").encode().unwrap();

        let forward = EventProcessor::with_time_source(
            Arc::new(InMemoryScanStore::new()),
            StepClock::starting_at(0),
        );
        forward.process(&older).unwrap();
        forward.process(&newer).unwrap();

        let backward = EventProcessor::with_time_source(
            Arc::new(InMemoryScanStore::new()),
            StepClock::starting_at(0),
        );
        assert_eq!(backward.process(&newer).unwrap(), 1);
        assert_eq!(backward.process(&older).unwrap(), 0);

        let a = forward.store().get(&key()).unwrap().unwrap();
        let b = backward.store().get(&key()).unwrap().unwrap();
        assert_eq!((a.scanned_at, a.response), (b.scanned_at, b.response));
    }

    #[test]
    fn test_redelivered_duplicate_is_noop() {
        let processor = EventProcessor::with_time_source(
            Arc::new(InMemoryScanStore::new()),
            StepClock::starting_at(500),
        );
        let message = ScanEnvelope::v2(key(), 42, "banner").encode().unwrap();

        assert_eq!(processor.process(&message).unwrap(), 1);
        for _ in 0..3 {
            assert_eq!(processor.process(&message).unwrap(), 0);
        }

        let stored = processor.store().get(&key()).unwrap().unwrap();
        assert_eq!(stored.received_at, 500);
        assert_eq!(processor.store().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shuffled_concurrent_delivery_keeps_max() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("scans.db"));
        let store = Arc::new(SqliteScanStore::open(&config).unwrap());
        let queue = queue(5);

        let keys: Vec<ScanKey> = (0..4)
            .map(|i| ScanKey::new(format!("10.1.0.{}", i), 8080, "http"))
            .collect();
        let mut events: Vec<ScanEnvelope> = keys
            .iter()
            .flat_map(|key| {
                (1..=40).map(move |ts| ScanEnvelope::v2(key.clone(), ts, &format!("scan-{}", ts)))
            })
            .collect();
        // Duplicates of a few events to model at-least-once delivery.
        let duplicates: Vec<ScanEnvelope> = events.iter().step_by(7).cloned().collect();
        events.extend(duplicates);
        events.shuffle(&mut rand::thread_rng());

        for event in &events {
            publish(&queue, event);
        }

        let summary = drain(&queue, Arc::clone(&store), 8).await;
        assert_eq!(summary.acked, events.len() as u64);
        assert_eq!(summary.nacked, 0);

        assert_eq!(store.count().unwrap(), 4);
        for key in &keys {
            let stored = store.get(key).unwrap().unwrap();
            assert_eq!(stored.scanned_at, 40);
            assert_eq!(stored.response, "scan-40");
        }
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_interfere() {
        let queue = queue(5);
        let store = Arc::new(InMemoryScanStore::new());

        for port in 1..=100u16 {
            let key = ScanKey::new("198.51.100.1", port, "tcp");
            publish(&queue, &ScanEnvelope::v2(key, i64::from(port), &port.to_string()));
        }

        let summary = drain(&queue, Arc::clone(&store), 16).await;
        assert_eq!(summary.acked, 100);
        assert_eq!(store.count().unwrap(), 100);

        for record in store.snapshot() {
            assert_eq!(record.scanned_at, i64::from(record.key.port));
            assert_eq!(record.response, record.key.port.to_string());
        }
    }
}
