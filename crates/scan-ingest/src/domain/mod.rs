//! # Domain Layer
//!
//! Pure scan ingest logic with no I/O: the wire envelope, the versioned
//! payload union, the normalizer and the persisted record.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod normalizer;
