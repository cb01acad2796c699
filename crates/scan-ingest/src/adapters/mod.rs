//! # Adapters Module
//!
//! Implementations of the `ScanStore` port.
//!
//! ## Modules
//!
//! - `memory`: HashMap-backed store for tests and ephemeral runs
//! - `sqlite`: Durable SQLite store (feature `sqlite`)

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
