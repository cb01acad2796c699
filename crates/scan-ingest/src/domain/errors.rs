//! # Domain Errors
//!
//! Only two kinds of failure leave the event processor: the envelope could
//! not be decoded, or the store rejected the write. Payload problems are not
//! errors (see `normalizer`).

use thiserror::Error;

/// Errors from the state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Lock wait exceeded the busy timeout.
    #[error("Store busy: {message}")]
    Busy { message: String },

    /// A table constraint rejected the write.
    #[error("Constraint violation: {message}")]
    Constraint { message: String },

    /// The database could not be opened or reached.
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    /// Any other engine or filesystem failure.
    #[error("Store I/O error: {message}")]
    Io { message: String },
}

impl StoreError {
    /// Whether a later attempt with the same input could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Constraint { .. })
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Busy { .. } => "busy",
            Self::Constraint { .. } => "constraint",
            Self::Unavailable { .. } => "unavailable",
            Self::Io { .. } => "io",
        }
    }
}

/// Errors from processing one message.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed JSON or missing/invalid required envelope fields.
    ///
    /// Redelivering the same bytes cannot succeed.
    #[error("Envelope decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The conditional upsert failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Whether redelivery can help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Decode(_) => false,
            Self::Store(_) => true,
        }
    }
}
