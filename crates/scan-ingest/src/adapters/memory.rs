use crate::domain::entities::{ScanKey, ScanRecord};
use crate::domain::errors::StoreError;
use crate::ports::outbound::ScanStore;
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory scan store for unit tests.
///
/// A single mutex covers the freshness check and the write, which gives the
/// same conditional-upsert semantics as the SQLite store.
#[derive(Default)]
pub struct InMemoryScanStore {
    records: Mutex<HashMap<ScanKey, ScanRecord>>,
}

impl InMemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record, ordered by key.
    pub fn snapshot(&self) -> Vec<ScanRecord> {
        let mut records: Vec<_> = self.records.lock().values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

impl ScanStore for InMemoryScanStore {
    fn upsert(&self, record: &ScanRecord) -> Result<u64, StoreError> {
        let mut records = self.records.lock();
        if !record.supersedes(records.get(&record.key)) {
            return Ok(0);
        }
        records.insert(record.key.clone(), record.clone());
        Ok(1)
    }

    fn get(&self, key: &ScanKey) -> Result<Option<ScanRecord>, StoreError> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.lock().len() as u64)
    }
}
