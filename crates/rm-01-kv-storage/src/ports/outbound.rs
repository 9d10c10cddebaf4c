//! # Outbound Ports (Driven Ports)
//!
//! The embedded key-value engine the storage driver sits on.
//!
//! Only a get/put/delete/batch/ascending-scan contract is required. The engine
//! does not need transactions or reverse iteration.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::errors::KVStoreError;

/// Abstract interface for key-value engine operations.
///
/// Production: `RocksDbStore` (rumor-runtime/adapters/storage/rocksdb_adapter.rs)
/// Testing: `InMemoryKVStore` (below)
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Apply every operation or none of them.
    ///
    /// With `sync` the engine must make the write durable before returning.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>, sync: bool)
        -> Result<(), KVStoreError>;

    /// Ascending scan over `[start, end)`. `None` leaves the range open-ended.
    fn range_scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;

    /// Close the engine handle. Later calls fail with [`KVStoreError::Closed`].
    fn close(&self) -> Result<(), KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }

    /// Key touched by this operation.
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } | BatchOperation::Delete { key } => key,
        }
    }
}

// =============================================================================
// ADAPTER IMPLEMENTATIONS
// Production: RocksDbStore in rumor-runtime/adapters/storage/rocksdb_adapter.rs
// Testing: In-memory implementation below
// =============================================================================

/// In-memory key-value store for tests and engine-less runs.
///
/// Data lives behind an `Arc` so a "restarted" process can be simulated with
/// [`InMemoryKVStore::reopen`]: the new handle sees exactly what was written
/// before the old one was closed.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    closed: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// New open handle over the same data.
    pub fn reopen(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            closed: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of write calls (puts, deletes and batches) that reached the engine.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn ensure_open(&self) -> Result<(), KVStoreError> {
        if self.is_closed() {
            return Err(KVStoreError::Closed);
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.ensure_open()?;
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.data.write().remove(key);
        Ok(())
    }

    fn atomic_batch_write(
        &self,
        operations: Vec<BatchOperation>,
        _sync: bool,
    ) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        // Single write lock: readers see all or nothing.
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn range_scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        self.ensure_open()?;
        let upper = match end {
            Some(end) => Bound::Excluded(end.to_vec()),
            None => Bound::Unbounded,
        };
        let data = self.data.read();
        Ok(data
            .range((Bound::Included(start.to_vec()), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn close(&self) -> Result<(), KVStoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
