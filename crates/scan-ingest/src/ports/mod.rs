//! # Ports Layer
//!
//! - `inbound` - The API this crate exposes to delivery code
//! - `outbound` - The SPIs the host must provide (state store, clock)

pub mod inbound;
pub mod outbound;
