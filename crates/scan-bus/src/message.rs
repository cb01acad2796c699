//! # Queue Messages
//!
//! The message abstraction consumed by the ingest pipeline.

use std::fmt;
use uuid::Uuid;

use crate::DEFAULT_SUBSCRIPTION;

/// Unique identifier assigned to a message when it is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh message id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Caller-supplied subscription identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIPTION)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A delivered message awaiting resolution.
///
/// Resolution consumes the message, so each delivery is resolved at most once.
/// Implementations should treat a message dropped without resolution as
/// nacked.
pub trait QueueMessage: Send + 'static {
    /// Transport-assigned message id.
    fn id(&self) -> MessageId;

    /// Opaque payload bytes.
    fn data(&self) -> &[u8];

    /// 1-based delivery attempt for this message.
    fn delivery_attempt(&self) -> u32;

    /// Mark the message as handled; it will not be delivered again.
    fn ack(self);

    /// Reject the message; it becomes eligible for redelivery per queue policy.
    fn nack(self);
}
