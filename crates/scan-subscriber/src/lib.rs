//! # Scan Subscriber
//!
//! Service wiring for the scan ingest pipeline.
//!
//! ## Modular Structure
//!
//! - `config` - CLI flags and environment fallbacks
//! - `feed` - Newline-delimited event source publishing onto the queue
//! - `runtime` - Store bootstrap, delivery adapter, graceful shutdown
//!
//! ## Flow
//!
//! ```text
//! [NDJSON feed] ──publish──→ [InMemoryScanQueue] ──→ [DeliveryAdapter]
//!                                   ↑                       │
//!                                   └──── ack / nack ───────┤
//!                                                           ↓
//!                                    [EventProcessor] ──→ [SqliteScanStore]
//! ```

pub mod config;
pub mod feed;
pub mod runtime;

pub use config::SubscriberConfig;
pub use feed::{publish_lines, FeedError, FeedSource, FeedStats};
pub use runtime::{RunReport, SubscriberRuntime};
