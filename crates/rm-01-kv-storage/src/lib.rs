//! # Key-Value Storage (rm-01)
//!
//! The storage layer shared by the replica and every indexer. It is built on a
//! plain, non-transactional key-value engine and adds one atomicity unit on
//! top of it: the **critical zone**.
//!
//! ```text
//!   Mantlemint ──┐                          ┌── get ──────────────┐
//!                ├── set/delete ─→ Driver ──┤                     ├─→ KeyValueStore
//!   Indexers ────┘      │                   └── flush (sync) ─────┘
//!                       └─→ [critical zone batch]
//! ```
//!
//! While a zone is open every write is buffered. Releasing the zone lands the
//! whole buffer as one synced batch; a forced purge drops it and closes the
//! engine, so a block's writes are either all visible or none are.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Key codec and error types
//! - `ports/` - `KeyValueStore` outbound port and the in-memory adapter
//! - `driver` - `StorageDriver` with critical-zone batching and iteration
//! - `sequence` - Leased monotonic counters
//!
//! ## Usage
//!
//! ```ignore
//! use rm_01_kv_storage::{InMemoryKVStore, StorageDriver};
//!
//! let driver = StorageDriver::new(Arc::new(InMemoryKVStore::new()));
//! driver.set_critical_zone()?;
//! driver.set(b"tx\x01a", b"payload")?;
//! driver.release_critical_zone()?;
//! ```

pub mod domain;
pub mod driver;
pub mod ports;
pub mod sequence;

pub use domain::errors::{KVStoreError, SequenceError, StorageError};
pub use domain::keys;
pub use driver::{Entry, StorageDriver};
pub use ports::outbound::{BatchOperation, InMemoryKVStore, KeyValueStore};
pub use sequence::Sequence;
