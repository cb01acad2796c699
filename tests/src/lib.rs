//! # Scan Ingest Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Queue → adapter → processor → store scenarios
//!     ├── ordering.rs   # Out-of-order, duplicate and concurrent delivery
//!     ├── delivery.rs   # Ack/nack resolution, redelivery, dead letters
//!     └── durability.rs # File-backed store across restarts and connections
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p scan-tests
//! cargo bench -p scan-tests
//! ```

pub mod integration;
