//! # In-Memory Scan Queue
//!
//! Topic/subscription queue with at-least-once delivery, kept in process.
//!
//! Every published message is copied into the backlog of each subscription
//! that exists at publish time. Consumers holding handles on the same
//! subscription compete for its backlog. A nacked message goes back to the
//! tail of the backlog until it has been delivered `max_deliveries` times,
//! after which it is moved to the subscription's dead letters.
//!
//! [`InMemoryScanQueue::publish_when_ready`] waits while any backlog holds
//! `max_backlog` messages; plain `publish` never waits.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::message::{MessageId, QueueMessage, SubscriptionId};
use crate::subscriber::QueueSubscription;
use crate::{DEFAULT_MAX_BACKLOG, DEFAULT_MAX_DELIVERIES};

/// Errors from queue operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was closed; no further publishes are accepted.
    #[error("Queue closed")]
    Closed,

    /// No subscription with this id exists.
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(SubscriptionId),
}

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Deliveries allowed per message before it is dead-lettered.
    pub max_deliveries: u32,

    /// Backlog length at which `publish_when_ready` waits. Redeliveries may
    /// push a backlog past it.
    pub max_backlog: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            max_backlog: DEFAULT_MAX_BACKLOG,
        }
    }
}

/// Point-in-time counters for one subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub published: u64,
    pub acked: u64,
    pub nacked: u64,
    pub dead_lettered: u64,
    pub in_flight: u64,
    pub backlog: u64,
}

/// A message that exhausted its delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub id: MessageId,
    pub data: Vec<u8>,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
struct Pending {
    id: MessageId,
    data: Arc<[u8]>,
    /// Deliveries already made for this message.
    deliveries: u32,
}

/// Shared state behind a subscription.
pub(crate) struct SubscriptionState {
    id: SubscriptionId,
    max_deliveries: u32,
    backlog: Mutex<VecDeque<Pending>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    notify: Notify,
    /// Shared with the queue; signalled when a backlog shrinks.
    space: Arc<Notify>,
    closed: AtomicBool,
    published: AtomicU64,
    in_flight: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
    dead_lettered: AtomicU64,
}

impl SubscriptionState {
    fn new(id: SubscriptionId, max_deliveries: u32, space: Arc<Notify>, closed: bool) -> Self {
        Self {
            id,
            max_deliveries: max_deliveries.max(1),
            backlog: Mutex::new(VecDeque::new()),
            dead_letters: Mutex::new(Vec::new()),
            notify: Notify::new(),
            space,
            closed: AtomicBool::new(closed),
            published: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            nacked: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> &SubscriptionId {
        &self.id
    }

    fn enqueue(&self, pending: Pending) {
        self.backlog.lock().push_back(pending);
        self.notify.notify_waiters();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Wait for the next deliverable message.
    ///
    /// Returns `None` once the queue is closed, the backlog is empty and no
    /// delivery is still unresolved (an unresolved one may yet be nacked back
    /// into the backlog).
    pub(crate) async fn next(self: &Arc<Self>) -> Option<ReceivedMessage> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_next() {
                return Some(message);
            }
            if self.closed.load(Ordering::SeqCst) && self.in_flight.load(Ordering::SeqCst) == 0 {
                return None;
            }

            notified.await;
        }
    }

    pub(crate) fn try_next(self: &Arc<Self>) -> Option<ReceivedMessage> {
        let pending = {
            let mut backlog = self.backlog.lock();
            let pending = backlog.pop_front()?;
            // Counted while the backlog lock is held so `next` never observes
            // an empty backlog with nothing in flight mid-handoff.
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            pending
        };
        self.space.notify_waiters();

        Some(ReceivedMessage {
            state: Arc::clone(self),
            id: pending.id,
            data: pending.data,
            attempt: pending.deliveries.saturating_add(1),
            resolved: false,
        })
    }

    fn finish(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn ack(&self, id: MessageId, attempt: u32) {
        self.acked.fetch_add(1, Ordering::Relaxed);
        debug!(subscription = %self.id, message_id = %id, attempt, "Message acked");
        self.finish();
    }

    fn nack(&self, id: MessageId, data: Arc<[u8]>, attempt: u32) {
        self.nacked.fetch_add(1, Ordering::Relaxed);

        if attempt >= self.max_deliveries {
            warn!(
                subscription = %self.id,
                message_id = %id,
                attempts = attempt,
                "Message exceeded delivery limit, moved to dead letters"
            );
            self.dead_lettered.fetch_add(1, Ordering::Relaxed);
            self.dead_letters.lock().push(DeadLetter {
                id,
                data: data.to_vec(),
                attempts: attempt,
            });
        } else {
            debug!(
                subscription = %self.id,
                message_id = %id,
                attempt,
                "Message nacked, redelivering"
            );
            self.backlog.lock().push_back(Pending {
                id,
                data,
                deliveries: attempt,
            });
        }

        self.finish();
    }

    fn backlog_len(&self) -> usize {
        self.backlog.lock().len()
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            published: self.published.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            backlog: self.backlog.lock().len() as u64,
        }
    }
}

/// One delivery of a message from an [`InMemoryScanQueue`] subscription.
///
/// Dropping it without calling `ack` or `nack` nacks it.
pub struct ReceivedMessage {
    state: Arc<SubscriptionState>,
    id: MessageId,
    data: Arc<[u8]>,
    attempt: u32,
    resolved: bool,
}

impl std::fmt::Debug for ReceivedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceivedMessage")
            .field("subscription", self.state.id())
            .field("id", &self.id)
            .field("len", &self.data.len())
            .field("attempt", &self.attempt)
            .finish()
    }
}

impl QueueMessage for ReceivedMessage {
    fn id(&self) -> MessageId {
        self.id
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn delivery_attempt(&self) -> u32 {
        self.attempt
    }

    fn ack(mut self) {
        self.resolved = true;
        self.state.ack(self.id, self.attempt);
    }

    fn nack(mut self) {
        self.resolved = true;
        self.state.nack(self.id, Arc::clone(&self.data), self.attempt);
    }
}

impl Drop for ReceivedMessage {
    fn drop(&mut self) {
        if !self.resolved {
            self.resolved = true;
            self.state.nack(self.id, Arc::clone(&self.data), self.attempt);
        }
    }
}

struct QueueInner {
    config: QueueConfig,
    subscriptions: RwLock<HashMap<SubscriptionId, Arc<SubscriptionState>>>,
    published: AtomicU64,
    closed: AtomicBool,
    space: Arc<Notify>,
}

/// In-process topic with per-subscription backlogs.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct InMemoryScanQueue {
    inner: Arc<QueueInner>,
}

impl InMemoryScanQueue {
    /// Create a queue with the default delivery limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    #[must_use]
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                config,
                subscriptions: RwLock::new(HashMap::new()),
                published: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                space: Arc::new(Notify::new()),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Create a subscription if it does not exist yet.
    ///
    /// Only messages published after creation reach it.
    pub fn create_subscription(&self, id: SubscriptionId) {
        let mut subs = self.inner.subscriptions.write();
        subs.entry(id.clone()).or_insert_with(|| {
            debug!(subscription = %id, "Subscription created");
            Arc::new(SubscriptionState::new(
                id,
                self.inner.config.max_deliveries,
                Arc::clone(&self.inner.space),
                self.inner.closed.load(Ordering::SeqCst),
            ))
        });
    }

    /// Open a consumer handle on an existing subscription.
    pub fn subscribe(&self, id: &SubscriptionId) -> Result<QueueSubscription, QueueError> {
        let subs = self.inner.subscriptions.read();
        let state = subs
            .get(id)
            .ok_or_else(|| QueueError::UnknownSubscription(id.clone()))?;
        Ok(QueueSubscription::new(Arc::clone(state)))
    }

    /// Publish a message to every subscription.
    ///
    /// A message published while no subscription exists is dropped.
    pub fn publish(&self, data: impl Into<Vec<u8>>) -> Result<MessageId, QueueError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let id = MessageId::new();
        let data: Arc<[u8]> = Arc::from(data.into());
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let subs = self.inner.subscriptions.read();
        if subs.is_empty() {
            warn!(message_id = %id, "Message dropped (no subscriptions)");
            return Ok(id);
        }

        for state in subs.values() {
            state.published.fetch_add(1, Ordering::Relaxed);
            state.enqueue(Pending {
                id,
                data: Arc::clone(&data),
                deliveries: 0,
            });
        }

        Ok(id)
    }

    /// Publish once every subscription's backlog is below `max_backlog`.
    ///
    /// Fails with [`QueueError::Closed`] if the queue closes while waiting.
    pub async fn publish_when_ready(
        &self,
        data: impl Into<Vec<u8>>,
    ) -> Result<MessageId, QueueError> {
        let limit = self.inner.config.max_backlog.max(1);
        loop {
            let notified = self.inner.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(QueueError::Closed);
            }
            let full = self
                .inner
                .subscriptions
                .read()
                .values()
                .any(|s| s.backlog_len() >= limit);
            if !full {
                return self.publish(data);
            }

            notified.await;
        }
    }

    /// Stop accepting publishes.
    ///
    /// Consumers drain the remaining backlog (including redeliveries) and then
    /// observe the end of their subscription.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        for state in self.inner.subscriptions.read().values() {
            state.close();
        }
        self.inner.space.notify_waiters();
        debug!("Queue closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Total messages published to the topic.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    pub fn stats(&self, id: &SubscriptionId) -> Option<QueueStats> {
        self.inner.subscriptions.read().get(id).map(|s| s.stats())
    }

    pub fn dead_letters(&self, id: &SubscriptionId) -> Vec<DeadLetter> {
        self.inner
            .subscriptions
            .read()
            .get(id)
            .map(|s| s.dead_letters.lock().clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryScanQueue {
    fn default() -> Self {
        Self::new()
    }
}
