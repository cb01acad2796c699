//! # Domain Entities
//!
//! The canonical, persisted representation of an endpoint's latest scan.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::envelope::ScanEnvelope;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Natural key of a monitored endpoint and service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScanKey {
    pub ip: String,
    pub port: u16,
    pub service: String,
}

impl ScanKey {
    pub fn new(ip: impl Into<String>, port: u16, service: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port,
            service: service.into(),
        }
    }
}

impl fmt::Display for ScanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.ip, self.port, self.service)
    }
}

/// Latest-state record for one key.
///
/// `response` is empty when the payload had no usable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub key: ScanKey,
    pub scanned_at: Timestamp,
    pub response: String,
    pub received_at: Timestamp,
}

impl ScanRecord {
    /// Build the write for a decoded envelope.
    pub fn from_envelope(
        envelope: &ScanEnvelope,
        response: String,
        received_at: Timestamp,
    ) -> Self {
        Self {
            key: envelope.key(),
            scanned_at: envelope.timestamp,
            response,
            received_at,
        }
    }

    /// Whether this write passes the freshness check against `stored`.
    pub fn supersedes(&self, stored: Option<&ScanRecord>) -> bool {
        stored.map_or(true, |s| self.scanned_at > s.scanned_at)
    }
}

/// What a conditional upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Record created or advanced.
    Applied,
    /// Stored record was as new or newer; nothing changed.
    Ignored,
}

impl UpsertOutcome {
    pub fn from_rows(rows: u64) -> Self {
        if rows == 0 {
            Self::Ignored
        } else {
            Self::Applied
        }
    }
}
