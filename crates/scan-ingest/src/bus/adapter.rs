//! # Scan Delivery Adapter
//!
//! Runs the (blocking) processor for each delivered message and resolves the
//! message from the outcome. Messages are handled concurrently up to a fixed
//! in-flight limit; ordering across messages is not preserved and does not
//! need to be, since the store's conditional upsert is order-independent.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use scan_bus::{MessageSubscriber, QueueMessage};
use scan_telemetry::{metric_inc, MESSAGES_ACKED, MESSAGES_NACKED};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::domain::errors::IngestError;
use crate::ports::inbound::ScanIngestApi;

/// Default number of messages processed at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Largest in-flight limit: the drain must be able to take back every permit
/// in a single `acquire_many`.
pub const MAX_CONCURRENCY: usize = if (u32::MAX as usize) < Semaphore::MAX_PERMITS {
    u32::MAX as usize
} else {
    Semaphore::MAX_PERMITS
};

/// Why a message was negatively acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackCause {
    /// The envelope could not be decoded. Redelivery will fail the same way.
    Decode,
    /// The store rejected or failed the write.
    Store,
    /// The processing task panicked or was cancelled.
    Worker,
}

impl NackCause {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Store => "store",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for NackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&IngestError> for NackCause {
    fn from(err: &IngestError) -> Self {
        match err {
            IngestError::Decode(_) => Self::Decode,
            IngestError::Store(_) => Self::Store,
        }
    }
}

/// How one message was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Processed; `rows` is 0 when the scan was older than the stored one.
    Acked { rows: u64 },
    /// Processing failed; the queue decides whether to redeliver.
    Nacked { cause: NackCause, error: String },
}

impl Delivery {
    pub fn is_acked(&self) -> bool {
        matches!(self, Self::Acked { .. })
    }
}

/// Totals for one `run` invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub acked: u64,
    pub nacked: u64,
}

#[derive(Default)]
struct RunCounters {
    acked: AtomicU64,
    nacked: AtomicU64,
}

impl RunCounters {
    fn record(&self, delivery: &Delivery) {
        let counter = if delivery.is_acked() {
            &self.acked
        } else {
            &self.nacked
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
        }
    }
}

/// Resolves queue messages through a [`ScanIngestApi`].
pub struct DeliveryAdapter<P: ScanIngestApi + 'static> {
    processor: Arc<P>,
    concurrency: usize,
}

impl<P: ScanIngestApi + 'static> Clone for DeliveryAdapter<P> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            concurrency: self.concurrency,
        }
    }
}

impl<P: ScanIngestApi + 'static> DeliveryAdapter<P> {
    pub fn new(processor: Arc<P>) -> Self {
        Self {
            processor,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the in-flight limit used by [`run`](Self::run), clamped to
    /// `1..=MAX_CONCURRENCY`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    /// Process one message and ack or nack it.
    ///
    /// The processor runs on the blocking pool since the upsert may wait on
    /// store locks.
    pub async fn handle<M: QueueMessage>(&self, message: M) -> Delivery {
        let message_id = message.id();
        let attempt = message.delivery_attempt();
        let data = message.data().to_vec();
        let processor = Arc::clone(&self.processor);

        let result = tokio::task::spawn_blocking(move || processor.process(&data)).await;

        let delivery = match result {
            Ok(Ok(rows)) => {
                if rows == 0 {
                    info!(%message_id, attempt, "ignored older message");
                } else {
                    info!(%message_id, attempt, rows, "upserted message");
                }
                Delivery::Acked { rows }
            }
            Ok(Err(e)) => {
                let cause = NackCause::from(&e);
                if cause == NackCause::Decode {
                    error!(
                        %message_id,
                        attempt,
                        error = %e,
                        "undecodable message (nack), dead-letter candidate"
                    );
                } else {
                    warn!(%message_id, attempt, error = %e, "process error (nack)");
                }
                Delivery::Nacked {
                    cause,
                    error: e.to_string(),
                }
            }
            Err(join_error) => {
                error!(
                    %message_id,
                    attempt,
                    error = %join_error,
                    "processing task failed (nack)"
                );
                Delivery::Nacked {
                    cause: NackCause::Worker,
                    error: join_error.to_string(),
                }
            }
        };

        match &delivery {
            Delivery::Acked { .. } => {
                message.ack();
                metric_inc!(MESSAGES_ACKED);
            }
            Delivery::Nacked { cause, .. } => {
                message.nack();
                metric_inc!(MESSAGES_NACKED, &[cause.label()]);
            }
        }

        delivery
    }

    /// Consume `subscription` until it ends or `shutdown` turns `true`.
    ///
    /// At most `concurrency` messages are in flight. Before returning, every
    /// in-flight message is resolved; messages not yet pulled stay in the
    /// queue.
    pub async fn run<S>(
        &self,
        mut subscription: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> RunSummary
    where
        S: MessageSubscriber,
    {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let counters = Arc::new(RunCounters::default());
        let subscription_id = subscription.subscription_id().clone();

        info!(
            subscription = %subscription_id,
            concurrency = self.concurrency,
            "Delivery adapter started"
        );

        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let message = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                message = subscription.next_message() => match message {
                    Some(message) => message,
                    None => {
                        debug!(subscription = %subscription_id, "Subscription ended");
                        break;
                    }
                },
            };

            let adapter = self.clone();
            let counters = Arc::clone(&counters);
            tokio::spawn(async move {
                let delivery = adapter.handle(message).await;
                counters.record(&delivery);
                drop(permit);
            });
        }

        // Every permit back means nothing is in flight.
        let limit = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        if permits.acquire_many(limit).await.is_err() {
            warn!(subscription = %subscription_id, "In-flight drain interrupted");
        }

        let summary = counters.summary();
        info!(
            subscription = %subscription_id,
            acked = summary.acked,
            nacked = summary.nacked,
            "Delivery adapter stopped"
        );
        summary
    }
}

/// Resolves once shutdown is signalled. A dropped sender never signals.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
