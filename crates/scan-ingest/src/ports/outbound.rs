//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the event processor.
//!
//! Production: `SqliteScanStore` (adapters/sqlite.rs)
//! Testing: `InMemoryScanStore` (adapters/memory.rs)

use crate::domain::entities::{ScanKey, ScanRecord, Timestamp};
use crate::domain::errors::StoreError;

/// Keyed latest-state store with a conditional upsert.
///
/// ## Serialization Guarantee
///
/// `upsert` is the single mutation entry point. For any key, the freshness
/// check and the write happen atomically with respect to every other caller
/// of `upsert` on that key; implementations may serialize more broadly (a
/// single connection, a global lock) but never less. Callers do not need to
/// coordinate writers themselves.
pub trait ScanStore: Send + Sync {
    /// Insert the record, or replace the stored one if `record.scanned_at` is
    /// strictly greater than the stored `scanned_at`.
    ///
    /// ## Returns
    ///
    /// - `Ok(1)` - record created or updated
    /// - `Ok(0)` - stored record is as new or newer; nothing changed
    ///
    /// ## Errors
    ///
    /// Busy/lock timeout, constraint violation, unavailable storage. Errors
    /// are always returned, never swallowed.
    fn upsert(&self, record: &ScanRecord) -> Result<u64, StoreError>;

    /// Read the stored record for a key.
    fn get(&self, key: &ScanKey) -> Result<Option<ScanRecord>, StoreError>;

    /// Number of stored records.
    fn count(&self) -> Result<u64, StoreError>;
}

impl<S: ScanStore + ?Sized> ScanStore for std::sync::Arc<S> {
    fn upsert(&self, record: &ScanRecord) -> Result<u64, StoreError> {
        (**self).upsert(record)
    }

    fn get(&self, key: &ScanKey) -> Result<Option<ScanRecord>, StoreError> {
        (**self).get(key)
    }

    fn count(&self) -> Result<u64, StoreError> {
        (**self).count()
    }
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current timestamp in seconds since epoch.
    fn now(&self) -> Timestamp;
}

/// Default time source using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| Timestamp::try_from(d.as_secs()).unwrap_or(Timestamp::MAX))
            .unwrap_or(0)
    }
}
