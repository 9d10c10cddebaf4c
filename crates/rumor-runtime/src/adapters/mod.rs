//! # Adapters
//!
//! - `storage/` - Key-value engines for the storage driver

pub mod storage;

pub use storage::open_storage;
