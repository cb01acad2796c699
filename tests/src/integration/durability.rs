//! # Durability Scenarios
//!
//! The file-backed store keeps its state across restarts and stays
//! consistent when several connections write to the same file.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use scan_ingest::{
        EventProcessor, ScanEnvelope, ScanIngestApi, ScanKey, ScanStore, SqliteScanStore,
        StoreConfig,
    };

    use crate::integration::fixtures::StepClock;

    fn key() -> ScanKey {
        ScanKey::new("2001:db8::1", 22, "ssh")
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("data").join("subscriber.db"));

        {
            let processor = EventProcessor::with_time_source(
                Arc::new(SqliteScanStore::open(&config).unwrap()),
                StepClock::starting_at(100),
            );
            let message = ScanEnvelope::v2(key(), 50, "SSH-2.0-OpenSSH_9.6").encode().unwrap();
            assert_eq!(processor.process(&message).unwrap(), 1);
        }

        let processor = EventProcessor::with_time_source(
            Arc::new(SqliteScanStore::open(&config).unwrap()),
            StepClock::starting_at(200),
        );

        // Redelivery of an already committed message after restart.
        let replay = ScanEnvelope::v2(key(), 50, "SSH-2.0-OpenSSH_9.6").encode().unwrap();
        assert_eq!(processor.process(&replay).unwrap(), 0);

        let stored = processor.store().get(&key()).unwrap().unwrap();
        assert_eq!(stored.received_at, 100);

        let newer = ScanEnvelope::v2(key(), 60, "SSH-2.0-OpenSSH_9.7").encode().unwrap();
        assert_eq!(processor.process(&newer).unwrap(), 1);
        let stored = processor.store().get(&key()).unwrap().unwrap();
        assert_eq!(stored.response, "SSH-2.0-OpenSSH_9.7");
        assert_eq!(stored.received_at, 200);
    }

    #[test]
    fn test_two_connections_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("shared.db"))
            .with_busy_timeout(Duration::from_secs(10));

        let first = Arc::new(SqliteScanStore::open(&config).unwrap());
        let second = Arc::new(SqliteScanStore::open(&config).unwrap());

        let writers: Vec<_> = [(Arc::clone(&first), 0), (Arc::clone(&second), 1)]
            .into_iter()
            .map(|(store, parity)| {
                std::thread::spawn(move || {
                    let processor = EventProcessor::new(store);
                    for ts in (1..=60).filter(|ts| ts % 2 == parity) {
                        let message = ScanEnvelope::v2(key(), ts, &ts.to_string())
                            .encode()
                            .unwrap();
                        processor.process(&message).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        for store in [&first, &second] {
            let stored = store.get(&key()).unwrap().unwrap();
            assert_eq!(stored.scanned_at, 60);
            assert_eq!(stored.response, "60");
            assert_eq!(store.count().unwrap(), 1);
        }
    }
}
