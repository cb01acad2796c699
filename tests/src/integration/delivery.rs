//! # Delivery Scenarios
//!
//! How each processing outcome resolves the queue message.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use scan_ingest::{
        DataVersion, InMemoryScanStore, ScanEnvelope, ScanKey, ScanRecord, ScanStore, StoreError,
    };
    use serde_json::json;

    use crate::integration::fixtures::{drain, publish, queue, subscription};

    /// Store whose first `failures` writes report a locked database.
    struct LockedThenFree {
        inner: InMemoryScanStore,
        failures: AtomicU32,
    }

    impl ScanStore for LockedThenFree {
        fn upsert(&self, record: &ScanRecord) -> Result<u64, StoreError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Busy {
                    message: "database is locked".into(),
                });
            }
            self.inner.upsert(record)
        }

        fn get(&self, key: &ScanKey) -> Result<Option<ScanRecord>, StoreError> {
            self.inner.get(key)
        }

        fn count(&self) -> Result<u64, StoreError> {
            self.inner.count()
        }
    }

    fn key() -> ScanKey {
        ScanKey::new("192.0.2.10", 25, "smtp")
    }

    #[tokio::test]
    async fn test_corrupted_payload_acked_with_empty_response() {
        let queue = queue(5);
        let store = Arc::new(InMemoryScanStore::new());

        publish(
            &queue,
            &ScanEnvelope::with_payload(key(), 7, DataVersion::V1, json!({ "wrong_field": "x" })),
        );

        let summary = drain(&queue, Arc::clone(&store), 1).await;
        assert_eq!(summary.acked, 1);
        assert_eq!(summary.nacked, 0);

        let stored = store.get(&key()).unwrap().unwrap();
        assert_eq!(stored.response, "");
        assert_eq!(stored.scanned_at, 7);
    }

    #[tokio::test]
    async fn test_undecodable_message_dead_lettered() {
        let queue = queue(3);
        let store = Arc::new(InMemoryScanStore::new());

        queue.publish(b"this is not json".to_vec()).unwrap();
        queue
            .publish(br#"{"ip":"192.0.2.10","service":"smtp","timestamp":1}"#.to_vec())
            .unwrap();

        let summary = drain(&queue, Arc::clone(&store), 2).await;
        assert_eq!(summary.acked, 0);
        assert_eq!(summary.nacked, 6);
        assert_eq!(store.count().unwrap(), 0);

        let dead = queue.dead_letters(&subscription());
        assert_eq!(dead.len(), 2);
        assert!(dead.iter().all(|d| d.attempts == 3));
    }

    #[tokio::test]
    async fn test_transient_store_failure_redelivered() {
        let queue = queue(5);
        let store = Arc::new(LockedThenFree {
            inner: InMemoryScanStore::new(),
            failures: AtomicU32::new(3),
        });

        publish(&queue, &ScanEnvelope::v1(key(), 11, b"220 mail.example ESMTP"));

        let summary = drain(&queue, Arc::clone(&store), 1).await;
        assert_eq!(summary.nacked, 3);
        assert_eq!(summary.acked, 1);
        assert!(queue.dead_letters(&subscription()).is_empty());

        let stored = store.get(&key()).unwrap().unwrap();
        assert_eq!(stored.response, "220 mail.example ESMTP");
    }

    #[tokio::test]
    async fn test_persistent_store_failure_dead_lettered() {
        let queue = queue(2);
        let store = Arc::new(LockedThenFree {
            inner: InMemoryScanStore::new(),
            failures: AtomicU32::new(u32::MAX),
        });

        publish(&queue, &ScanEnvelope::v2(key(), 1, "x"));

        let summary = drain(&queue, Arc::clone(&store), 1).await;
        assert_eq!(summary.nacked, 2);
        assert_eq!(queue.dead_letters(&subscription()).len(), 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mixed_versions_and_wire_spellings() {
        let queue = queue(5);
        let store = Arc::new(InMemoryScanStore::new());

        let raw = [
            json!({"ip": "192.0.2.1", "port": 80, "service": "http", "timestamp": 5,
                   "dataVersion": "V1", "data": {"responseBytesUtf8": "SFRUUC8xLjEgMjAwIE9L"}}),
            json!({"ip": "192.0.2.2", "port": 80, "service": "http", "timestamp": 5,
                   "data_version": 2, "data": {"response_str": "HTTP/1.1 404"}}),
            json!({"ip": "192.0.2.3", "port": 80, "service": "http", "timestamp": 5,
                   "dataVersion": "V3", "data": {"responseStr": "ignored"}}),
            json!({"ip": "192.0.2.4", "port": 80, "service": "http", "timestamp": 5}),
        ];
        for event in &raw {
            queue.publish(serde_json::to_vec(event).unwrap()).unwrap();
        }

        let summary = drain(&queue, Arc::clone(&store), 4).await;
        assert_eq!(summary.acked, 4);

        let response = |ip: &str| {
            store
                .get(&ScanKey::new(ip, 80, "http"))
                .unwrap()
                .unwrap()
                .response
        };
        assert_eq!(response("192.0.2.1"), "HTTP/1.1 200 OK");
        assert_eq!(response("192.0.2.2"), "HTTP/1.1 404");
        assert_eq!(response("192.0.2.3"), "");
        assert_eq!(response("192.0.2.4"), "");
    }
}
