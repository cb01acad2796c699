//! # Scan Ingest
//!
//! Turns at-least-once delivered scan result messages into exactly one
//! latest-state record per scanned endpoint.
//!
//! ## Pipeline
//!
//! ```text
//! [Queue] ──message──→ [DeliveryAdapter] ──bytes──→ [EventProcessor]
//!    ↑                        │                          │
//!    └──── ack / nack ────────┘               ┌──────────┴──────────┐
//!                                             ↓                     ↓
//!                                    [normalize payload]   [ScanStore::upsert]
//!                                                            (conditional)
//! ```
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | One Record Per Key | `(ip, port, service)` is the primary key; create and update share one write path |
//! | 2 | Scan Time Monotonicity | A write applies only if its `scanned_at` is strictly newer than the stored one |
//! | 3 | Empty Is Valid | An unparseable payload is stored as an empty response, never an error |
//! | 4 | Received Time | `received_at` is the wall-clock time of the write that last changed the record |
//! | 5 | Atomic Check-And-Write | The freshness check and the write cannot interleave with another writer |
//!
//! ## Error Policy
//!
//! Only envelope decode failures and store failures leave the processor;
//! both cause a nack. Payload problems are absorbed by the normalizer.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Envelope, payload union, normalizer, records, errors
//! - `ports/` - Inbound API (`ScanIngestApi`), outbound SPI (`ScanStore`, `TimeSource`)
//! - `adapters/` - SQLite and in-memory stores
//! - `service.rs` - `EventProcessor` implementing the inbound API
//! - `bus/` - `DeliveryAdapter` resolving queue messages

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod bus;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::entities::{ScanKey, ScanRecord, Timestamp, UpsertOutcome};
pub use domain::envelope::{DataVersion, ScanEnvelope, ScanPayload, V1Payload, V2Payload};
pub use domain::errors::{IngestError, StoreError};
pub use domain::normalizer::{normalize, normalize_payload, Normalized, UnparseableReason};
pub use ports::inbound::ScanIngestApi;
pub use ports::outbound::{ScanStore, SystemTimeSource, TimeSource};
pub use service::EventProcessor;

pub use adapters::memory::InMemoryScanStore;
#[cfg(feature = "sqlite")]
pub use adapters::sqlite::{
    JournalMode, SqliteScanStore, StoreConfig, DEFAULT_BUSY_TIMEOUT, DEFAULT_DB_PATH,
};

pub use bus::{
    Delivery, DeliveryAdapter, NackCause, RunSummary, DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
};
