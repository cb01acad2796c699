//! # Payload Normalizer
//!
//! Maps a versioned payload to the single text response that gets stored.
//!
//! Normalization never fails. A payload with no usable response becomes
//! [`Normalized::Unparseable`], which is stored as the empty string: the scan
//! still happened and is still recorded.

use serde_json::Value;
use std::fmt;

use super::envelope::{DataVersion, ScanEnvelope, ScanPayload};

/// Why a payload produced no response text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnparseableReason {
    /// `dataVersion` missing or not one of the supported versions.
    UnknownVersion,
    /// `data` does not have the shape its version requires.
    MalformedPayload(String),
    /// The response field is absent or empty.
    EmptyResponse,
}

impl UnparseableReason {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnknownVersion => "unknown_version",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::EmptyResponse => "empty_response",
        }
    }
}

impl fmt::Display for UnparseableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownVersion => write!(f, "unknown data version"),
            Self::MalformedPayload(msg) => write!(f, "malformed payload: {}", msg),
            Self::EmptyResponse => write!(f, "empty response"),
        }
    }
}

/// Result of normalizing a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Non-empty response text.
    Response(String),
    /// No usable response.
    Unparseable(UnparseableReason),
}

impl Normalized {
    /// The value persisted in the `response` column.
    pub fn into_stored(self) -> String {
        match self {
            Self::Response(text) => text,
            Self::Unparseable(_) => String::new(),
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Self::Unparseable(_))
    }
}

impl ScanPayload {
    /// Extract the response text carried by this payload.
    pub fn into_normalized(self) -> Normalized {
        match self {
            Self::V1(v1) if !v1.response_bytes.is_empty() => Normalized::Response(
                String::from_utf8(v1.response_bytes)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()),
            ),
            Self::V2(v2) if !v2.response_str.is_empty() => Normalized::Response(v2.response_str),
            _ => Normalized::Unparseable(UnparseableReason::EmptyResponse),
        }
    }
}

/// Normalize a raw `data` value declared as `version`.
pub fn normalize_payload(version: DataVersion, data: &Value) -> Normalized {
    match ScanPayload::decode(version, data) {
        Ok(payload) => payload.into_normalized(),
        Err(reason) => Normalized::Unparseable(reason),
    }
}

/// Normalize an envelope's payload to the stored response text.
///
/// Returns the empty string when the payload has no usable response.
pub fn normalize(envelope: &ScanEnvelope) -> String {
    normalize_payload(envelope.data_version, &envelope.data).into_stored()
}
