//! # Scan Bus - Delivery Transport Boundary
//!
//! Defines how scan result messages reach the ingest pipeline and how the
//! pipeline resolves them.
//!
//! ## Contract
//!
//! - A message exposes opaque payload bytes and exactly two resolutions:
//!   [`QueueMessage::ack`] and [`QueueMessage::nack`].
//! - A subscription is identified by a caller-supplied [`SubscriptionId`].
//! - Delivery is at-least-once: a nacked (or dropped) message is redelivered
//!   until it is acked or exceeds the delivery limit, after which it is
//!   dead-lettered.
//!
//! ```text
//! ┌───────────┐  publish()  ┌──────────────────┐  next_message()  ┌──────────┐
//! │ Producer  │ ──────────→ │ InMemoryScanQueue│ ───────────────→ │ Consumer │
//! └───────────┘             │  [per-sub backlog]│ ←── ack / nack ─ └──────────┘
//!                           └──────────────────┘
//!                                   │ attempts > max_deliveries
//!                                   ↓
//!                             [dead letters]
//! ```
//!
//! [`InMemoryScanQueue`] is the in-process implementation used by the
//! subscriber binary and the test suite. A hosted queue client plugs in by
//! implementing [`QueueMessage`] and [`MessageSubscriber`].

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod message;
pub mod queue;
pub mod subscriber;

pub use message::{MessageId, QueueMessage, SubscriptionId};
pub use queue::{
    DeadLetter, InMemoryScanQueue, QueueConfig, QueueError, QueueStats, ReceivedMessage,
};
pub use subscriber::{MessageSubscriber, QueueSubscription};

/// Default number of delivery attempts before a message is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

/// Default backlog length at which bounded publishes wait.
pub const DEFAULT_MAX_BACKLOG: usize = 1024;

/// Subscription used when the caller does not supply one.
pub const DEFAULT_SUBSCRIPTION: &str = "scan-sub";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delivery_limit_dead_letters() {
        let queue = InMemoryScanQueue::new();
        let id = SubscriptionId::default();
        queue.create_subscription(id.clone());
        queue.publish(b"scan".to_vec()).unwrap();

        let mut subscription = queue.subscribe(&id).unwrap();
        for attempt in 1..=DEFAULT_MAX_DELIVERIES {
            let message = subscription.try_next_message().unwrap();
            assert_eq!(message.delivery_attempt(), attempt);
            message.nack();
        }

        assert!(subscription.try_next_message().is_none());
        let dead = queue.dead_letters(&id);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, DEFAULT_MAX_DELIVERIES);
    }

    #[test]
    fn test_default_subscription_name() {
        let queue = InMemoryScanQueue::new();
        queue.create_subscription(SubscriptionId::default());
        assert!(queue.subscribe(&SubscriptionId::from(DEFAULT_SUBSCRIPTION)).is_ok());
    }
}
