//! # Ports Layer
//!
//! - `outbound.rs` - Driven ports (the key-value engine)

pub mod outbound;
