//! # Delivery Adapter
//!
//! Connects the event processor to a queue subscription.
//!
//! ```text
//! [MessageSubscriber] ──message──→ [DeliveryAdapter] ──bytes──→ [ScanIngestApi]
//!          ↑                              │
//!          └────────── ack / nack ────────┘
//! ```
//!
//! ## Resolution Rules
//!
//! | Processor result | Resolution |
//! |------------------|------------|
//! | `Ok(rows)` (any `rows`, including 0) | ack |
//! | `Err(Decode)` | nack (dead-letter candidate) |
//! | `Err(Store)` | nack (redelivery may succeed) |
//! | processor panicked | nack |

mod adapter;

pub use adapter::{
    Delivery, DeliveryAdapter, NackCause, RunSummary, DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
};
