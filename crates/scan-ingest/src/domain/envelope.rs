//! # Scan Event Envelope
//!
//! Wire format of a scan result message and its versioned payload.
//!
//! ```text
//! { "ip": string, "port": number, "service": string,
//!   "timestamp": number, "dataVersion": "V1" | "V2",
//!   "data": { ... version-specific ... } }
//! ```
//!
//! `ip`, `port`, `service` and `timestamp` are required; a message without
//! them is not a scan event. `dataVersion` and `data` describe the payload
//! only, so their problems surface as an unparseable payload instead.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use super::entities::{ScanKey, Timestamp};
use super::normalizer::UnparseableReason;

/// Payload schema version.
///
/// Accepts `"V1"`/`"V2"` (any case) or the integers `1`/`2`. Anything else,
/// including an absent field, is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataVersion {
    V1,
    V2,
    #[default]
    Unknown,
}

impl DataVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "V1",
            Self::V2 => "V2",
            Self::Unknown => "unknown",
        }
    }
}

impl Serialize for DataVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::V1 | Self::V2 => serializer.serialize_str(self.as_str()),
            Self::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for DataVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = match Value::deserialize(deserializer)? {
            Value::String(s) if s.eq_ignore_ascii_case("v1") => Self::V1,
            Value::String(s) if s.eq_ignore_ascii_case("v2") => Self::V2,
            Value::Number(n) => match n.as_i64() {
                Some(1) => Self::V1,
                Some(2) => Self::V2,
                _ => Self::Unknown,
            },
            _ => Self::Unknown,
        };
        Ok(version)
    }
}

/// A decoded scan result message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEnvelope {
    pub ip: String,
    pub port: u16,
    pub service: String,
    /// When the scan ran (unix seconds).
    pub timestamp: Timestamp,
    #[serde(default, alias = "data_version")]
    pub data_version: DataVersion,
    #[serde(default)]
    pub data: Value,
}

impl ScanEnvelope {
    /// Decode raw message bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Build a V1 envelope carrying raw response bytes.
    pub fn v1(key: ScanKey, timestamp: Timestamp, response: &[u8]) -> Self {
        Self::with_payload(
            key,
            timestamp,
            DataVersion::V1,
            json!({ "responseBytesUtf8": STANDARD.encode(response) }),
        )
    }

    /// Build a V2 envelope carrying a text response.
    pub fn v2(key: ScanKey, timestamp: Timestamp, response: &str) -> Self {
        Self::with_payload(
            key,
            timestamp,
            DataVersion::V2,
            json!({ "responseStr": response }),
        )
    }

    pub fn with_payload(
        key: ScanKey,
        timestamp: Timestamp,
        data_version: DataVersion,
        data: Value,
    ) -> Self {
        Self {
            ip: key.ip,
            port: key.port,
            service: key.service,
            timestamp,
            data_version,
            data,
        }
    }

    pub fn key(&self) -> ScanKey {
        ScanKey::new(self.ip.clone(), self.port, self.service.clone())
    }

    /// Decode `data` according to `dataVersion`.
    pub fn payload(&self) -> Result<ScanPayload, UnparseableReason> {
        ScanPayload::decode(self.data_version, &self.data)
    }
}

/// V1 payload: the service response as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct V1Payload {
    #[serde(
        rename = "responseBytesUtf8",
        alias = "response_bytes_utf8",
        default,
        with = "response_bytes"
    )]
    pub response_bytes: Vec<u8>,
}

/// V2 payload: the service response as text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct V2Payload {
    #[serde(
        rename = "responseStr",
        alias = "response_str",
        default,
        deserialize_with = "string_or_null"
    )]
    pub response_str: String,
}

/// Version-tagged payload, decoded straight from the generic `data` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPayload {
    V1(V1Payload),
    V2(V2Payload),
}

impl ScanPayload {
    /// Decode `data` into the variant selected by `version`.
    pub fn decode(version: DataVersion, data: &Value) -> Result<Self, UnparseableReason> {
        if version == DataVersion::Unknown {
            return Err(UnparseableReason::UnknownVersion);
        }
        if data.is_null() {
            return Err(UnparseableReason::EmptyResponse);
        }

        let decoded = match version {
            DataVersion::V1 => V1Payload::deserialize(data).map(Self::V1),
            DataVersion::V2 => V2Payload::deserialize(data).map(Self::V2),
            DataVersion::Unknown => return Err(UnparseableReason::UnknownVersion),
        };
        decoded.map_err(|e| UnparseableReason::MalformedPayload(e.to_string()))
    }

    pub fn version(&self) -> DataVersion {
        match self {
            Self::V1(_) => DataVersion::V1,
            Self::V2(_) => DataVersion::V2,
        }
    }
}

/// `responseBytesUtf8` as a base64 string or a JSON array of byte values.
///
/// A string that is not valid base64 is rejected.
mod response_bytes {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => STANDARD
                .decode(&s)
                .map_err(|e| D::Error::custom(format!("invalid base64 response bytes: {e}"))),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| D::Error::custom("byte values must be integers in 0..=255"))
                })
                .collect(),
            other => Err(D::Error::custom(format!(
                "expected base64 string or byte array, got {other}"
            ))),
        }
    }
}

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
