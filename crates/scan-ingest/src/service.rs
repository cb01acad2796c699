//! # Event Processor
//!
//! Implements `ScanIngestApi`: decode, normalize, conditionally upsert.
//!
//! ## Flow
//!
//! 1. Decode the raw bytes as a `ScanEnvelope` (failure is terminal for the message)
//! 2. Normalize the payload to a response string (never fails)
//! 3. Upsert `(key, scanned_at, response, now)` through the injected store
//!
//! The processor holds no mutable state of its own; all write serialization
//! is delegated to the `ScanStore` contract.

use std::sync::Arc;

use scan_telemetry::{
    metric_inc, DECODE_FAILURES, PAYLOADS_UNPARSEABLE, SCANS_APPLIED, SCANS_IGNORED,
    STORE_ERRORS, UPSERT_DURATION,
};
use tracing::{debug, warn};

use crate::domain::entities::{ScanRecord, UpsertOutcome};
use crate::domain::envelope::ScanEnvelope;
use crate::domain::errors::{IngestError, StoreError};
use crate::domain::normalizer::{normalize_payload, Normalized};
use crate::ports::inbound::ScanIngestApi;
use crate::ports::outbound::{ScanStore, SystemTimeSource, TimeSource};

/// The scan event processor.
pub struct EventProcessor<S, T = SystemTimeSource>
where
    S: ScanStore,
    T: TimeSource,
{
    /// Shared state store handle.
    store: Arc<S>,
    /// Clock for `received_at`.
    time_source: T,
}

impl<S: ScanStore> EventProcessor<S, SystemTimeSource> {
    /// Create a processor stamping writes with the system clock.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_time_source(store, SystemTimeSource)
    }
}

impl<S, T> EventProcessor<S, T>
where
    S: ScanStore,
    T: TimeSource,
{
    pub fn with_time_source(store: Arc<S>, time_source: T) -> Self {
        Self { store, time_source }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Normalize and upsert an already-decoded envelope.
    pub fn process_envelope(&self, envelope: &ScanEnvelope) -> Result<u64, StoreError> {
        let key = envelope.key();

        let response = match normalize_payload(envelope.data_version, &envelope.data) {
            Normalized::Response(text) => text,
            Normalized::Unparseable(reason) => {
                debug!(
                    %key,
                    version = envelope.data_version.as_str(),
                    %reason,
                    "unparseable payload stored as empty response"
                );
                metric_inc!(PAYLOADS_UNPARSEABLE, &[reason.label()]);
                String::new()
            }
        };

        let record = ScanRecord::from_envelope(envelope, response, self.time_source.now());

        let timer = UPSERT_DURATION.start_timer();
        let result = self.store.upsert(&record);
        timer.observe_duration();

        let rows = result.map_err(|e| {
            warn!(%key, error = %e, "scan upsert failed");
            metric_inc!(STORE_ERRORS, &[e.kind()]);
            e
        })?;

        match UpsertOutcome::from_rows(rows) {
            UpsertOutcome::Applied => {
                debug!(%key, scanned_at = record.scanned_at, rows, "scan record upserted");
                metric_inc!(SCANS_APPLIED);
            }
            UpsertOutcome::Ignored => {
                debug!(%key, scanned_at = record.scanned_at, "ignored older scan");
                metric_inc!(SCANS_IGNORED);
            }
        }

        Ok(rows)
    }
}

impl<S, T> ScanIngestApi for EventProcessor<S, T>
where
    S: ScanStore,
    T: TimeSource,
{
    fn process(&self, raw: &[u8]) -> Result<u64, IngestError> {
        let envelope = ScanEnvelope::decode(raw).map_err(|e| {
            warn!(error = %e, bytes = raw.len(), "failed to decode scan envelope");
            metric_inc!(DECODE_FAILURES);
            IngestError::Decode(e)
        })?;

        Ok(self.process_envelope(&envelope)?)
    }
}
