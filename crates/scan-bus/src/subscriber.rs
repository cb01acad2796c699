//! # Message Subscriber
//!
//! Defines the consuming side of the transport.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::message::{QueueMessage, SubscriptionId};
use crate::queue::{ReceivedMessage, SubscriptionState};

/// Trait for pulling messages from a subscription.
#[async_trait]
pub trait MessageSubscriber: Send {
    /// Message type handed to the consumer.
    type Message: QueueMessage;

    /// The subscription this consumer reads from.
    fn subscription_id(&self) -> &SubscriptionId;

    /// Wait for the next message.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next delivery (new or redelivered)
    /// - `None` - The subscription has ended
    async fn next_message(&mut self) -> Option<Self::Message>;
}

/// A consumer handle on an [`InMemoryScanQueue`](crate::InMemoryScanQueue)
/// subscription.
pub struct QueueSubscription {
    state: Arc<SubscriptionState>,
}

impl QueueSubscription {
    pub(crate) fn new(state: Arc<SubscriptionState>) -> Self {
        debug!(subscription = %state.id(), "Consumer attached");
        Self { state }
    }

    /// Take the next message without waiting.
    pub fn try_next_message(&mut self) -> Option<ReceivedMessage> {
        self.state.try_next()
    }
}

#[async_trait]
impl MessageSubscriber for QueueSubscription {
    type Message = ReceivedMessage;

    fn subscription_id(&self) -> &SubscriptionId {
        self.state.id()
    }

    async fn next_message(&mut self) -> Option<ReceivedMessage> {
        self.state.next().await
    }
}
