//! Prometheus metrics for the scan ingest pipeline.
//!
//! All metrics follow the naming convention: `scan_<component>_<metric>_<unit>`
//!
//! There is no scrape endpoint; [`write_metrics`] dumps the registry in text
//! format for the node_exporter textfile collector.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT PROCESSOR
    // =========================================================================

    /// Writes that created or advanced a scan record
    pub static ref SCANS_APPLIED: IntCounter = IntCounter::new(
        "scan_processor_scans_applied_total",
        "Scan events that created or advanced a record"
    ).expect("metric creation failed");

    /// Writes ignored because the stored record is as new or newer
    pub static ref SCANS_IGNORED: IntCounter = IntCounter::new(
        "scan_processor_scans_ignored_total",
        "Scan events ignored by the freshness check"
    ).expect("metric creation failed");

    /// Payloads stored with an empty response, by reason
    pub static ref PAYLOADS_UNPARSEABLE: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "scan_processor_payloads_unparseable_total",
            "Payloads normalized to an empty response"
        ),
        &["reason"]  // unknown_version, malformed_payload, empty_response
    ).expect("metric creation failed");

    /// Envelopes that could not be decoded
    pub static ref DECODE_FAILURES: IntCounter = IntCounter::new(
        "scan_processor_decode_failures_total",
        "Messages whose envelope could not be decoded"
    ).expect("metric creation failed");

    // =========================================================================
    // STATE STORE
    // =========================================================================

    /// Store errors by kind
    pub static ref STORE_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("scan_store_errors_total", "State store errors by kind"),
        &["kind"]  // busy, constraint, unavailable, io
    ).expect("metric creation failed");

    /// Conditional upsert latency
    pub static ref UPSERT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "scan_store_upsert_duration_seconds",
            "Time spent in the conditional upsert"
        ).buckets(exponential_buckets(0.0001, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // DELIVERY ADAPTER
    // =========================================================================

    /// Messages acknowledged
    pub static ref MESSAGES_ACKED: IntCounter = IntCounter::new(
        "scan_delivery_messages_acked_total",
        "Messages acknowledged after successful processing"
    ).expect("metric creation failed");

    /// Messages negatively acknowledged, by cause
    pub static ref MESSAGES_NACKED: IntCounterVec = IntCounterVec::new(
        Opts::new("scan_delivery_messages_nacked_total", "Messages negatively acknowledged"),
        &["cause"]  // decode, store, worker
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Processor
        Box::new(SCANS_APPLIED.clone()),
        Box::new(SCANS_IGNORED.clone()),
        Box::new(PAYLOADS_UNPARSEABLE.clone()),
        Box::new(DECODE_FAILURES.clone()),
        // Store
        Box::new(STORE_ERRORS.clone()),
        Box::new(UPSERT_DURATION.clone()),
        // Delivery
        Box::new(MESSAGES_ACKED.clone()),
        Box::new(MESSAGES_NACKED.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Write [`encode_metrics`] output to `path`, replacing it atomically.
pub fn write_metrics(path: &Path) -> Result<(), TelemetryError> {
    let text = encode_metrics()?;
    let tmp = path.with_extension("prom.tmp");
    fs::write(&tmp, text).map_err(|e| TelemetryError::MetricsExport(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| TelemetryError::MetricsExport(e.to_string()))
}
