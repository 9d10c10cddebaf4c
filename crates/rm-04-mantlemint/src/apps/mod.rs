//! # Bundled Applications
//!
//! - `kvstore.rs` - Key/value application used by the `rumor` binary and tests

pub mod kvstore;
