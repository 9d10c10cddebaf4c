//! # Domain Errors
//!
//! Error types for the storage layer.

use thiserror::Error;

/// Errors raised by a key-value engine adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// The engine handle was closed by a purge.
    #[error("key-value store is closed")]
    Closed,

    /// Engine-level I/O or corruption failure.
    #[error("database error: {message}")]
    Database { message: String },
}

/// Errors raised by the storage driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error(transparent)]
    Store(#[from] KVStoreError),

    /// A second zone was requested while one is still open.
    #[error("critical zone already open")]
    CriticalZoneOpen,

    /// Release was requested with no zone open.
    #[error("no critical zone to release")]
    NoCriticalZone,

    /// A stored value could not be decoded.
    #[error("failed to decode value at {key}: {message}")]
    Decode { key: String, message: String },
}

/// Errors raised by a leased sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("sequence key must not be empty")]
    EmptyKey,

    #[error("sequence bandwidth must be greater than zero")]
    ZeroBandwidth,

    /// The stored lease record is not an 8-byte big-endian integer.
    #[error("malformed lease record: expected 8 bytes, got {len}")]
    MalformedLease { len: usize },

    #[error("sequence exhausted")]
    Exhausted,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
