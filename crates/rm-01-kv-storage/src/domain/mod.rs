//! # Domain Layer
//!
//! - `keys` - Canonical key construction for documents and secondary indices
//! - `errors` - Error types

pub mod errors;
pub mod keys;
