//! # Scan Telemetry
//!
//! Logging and metrics setup shared by the scan ingest crates.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` registry with an `EnvFilter` and either a
//!   human-readable or JSON `fmt` layer
//! - **Metrics**: Prometheus counters for pipeline outcomes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scan_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SCAN_SERVICE_NAME` | `scan-subscriber` | Service name attached to startup logs |
//! | `SCAN_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `SCAN_JSON_LOGS` | `false` (`true` in containers) | Emit JSON lines |
//! | `SCAN_CONSOLE_OUTPUT` | `true` | Write logs to stdout at all |
//!
//! Metrics are not served over HTTP; the subscriber's `--metrics-file` writes
//! them out with [`write_metrics`].

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, write_metrics, MetricsHandle, DECODE_FAILURES,
    MESSAGES_ACKED, MESSAGES_NACKED, PAYLOADS_UNPARSEABLE, SCANS_APPLIED, SCANS_IGNORED,
    STORE_ERRORS, UPSERT_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Failed to export metrics: {0}")]
    MetricsExport(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    init_logging(config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        let before = SCANS_APPLIED.get();
        metric_inc!(SCANS_APPLIED);
        assert!(SCANS_APPLIED.get() > before);

        metric_inc!(PAYLOADS_UNPARSEABLE, &["unknown_version"]);
        assert!(PAYLOADS_UNPARSEABLE.with_label_values(&["unknown_version"]).get() >= 1);
    }
}
