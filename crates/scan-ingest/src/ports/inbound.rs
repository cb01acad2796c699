//! # Inbound Ports (Driving Ports)
//!
//! The primary API of the ingest pipeline.

use crate::domain::errors::IngestError;

/// Process one raw scan result message.
///
/// Implementations are shared across concurrent deliveries, so `process`
/// takes `&self`; write serialization is the store's job.
pub trait ScanIngestApi: Send + Sync {
    /// Decode, normalize and conditionally upsert one message.
    ///
    /// ## Returns
    ///
    /// Rows affected by the upsert: `1` when the record was created or
    /// advanced, `0` when an equal-or-newer record was already stored.
    ///
    /// ## Errors
    ///
    /// - `Decode`: the bytes are not a scan event envelope (not retryable)
    /// - `Store`: the upsert failed (retryable by redelivery)
    fn process(&self, raw: &[u8]) -> Result<u64, IngestError>;
}
