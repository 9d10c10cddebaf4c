//! # Storage Driver
//!
//! Wraps a [`KeyValueStore`] with critical-zone batching and prefix iteration.
//!
//! ## Critical Zone
//!
//! | Call | Effect |
//! |------|--------|
//! | `set_critical_zone` | Opens the single write batch |
//! | `set` / `delete` | Buffered into the batch while it is open |
//! | `release_critical_zone` | Flushes the batch as one synced write |
//! | `purge(true)` | Drops the batch unapplied, closes the engine |
//! | `purge(false)` | Flushes any open batch, closes the engine |
//!
//! Reads always go to the engine, so buffered writes are invisible to every
//! reader (including the writer) until the zone is released.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::errors::StorageError;
use crate::domain::keys::reverse_seek_key;
use crate::ports::outbound::{BatchOperation, KeyValueStore};

/// Critical-zone aware storage driver.
///
/// Shared behind an `Arc` by the replica, the sequences and every indexer.
pub struct StorageDriver {
    engine: Arc<dyn KeyValueStore>,
    zone: Mutex<Option<Vec<BatchOperation>>>,
}

impl StorageDriver {
    pub fn new(engine: Arc<dyn KeyValueStore>) -> Self {
        Self {
            engine,
            zone: Mutex::new(None),
        }
    }

    /// Read a committed value.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.engine.get(key)?)
    }

    /// Write a value, into the open zone if there is one.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut zone = self.zone.lock();
        match zone.as_mut() {
            Some(batch) => {
                batch.push(BatchOperation::put(key, value));
                Ok(())
            }
            None => Ok(self.engine.put(key, value)?),
        }
    }

    /// Delete a key, into the open zone if there is one.
    pub fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        let mut zone = self.zone.lock();
        match zone.as_mut() {
            Some(batch) => {
                batch.push(BatchOperation::delete(key));
                Ok(())
            }
            None => Ok(self.engine.delete(key)?),
        }
    }

    /// Apply several operations together.
    ///
    /// Inside a zone they join the zone's batch; outside they are written as
    /// one unsynced engine batch.
    pub fn write_batch(&self, operations: Vec<BatchOperation>) -> Result<(), StorageError> {
        let mut zone = self.zone.lock();
        match zone.as_mut() {
            Some(batch) => {
                batch.extend(operations);
                Ok(())
            }
            None => Ok(self.engine.atomic_batch_write(operations, false)?),
        }
    }

    /// Open the critical zone.
    pub fn set_critical_zone(&self) -> Result<(), StorageError> {
        let mut zone = self.zone.lock();
        if zone.is_some() {
            return Err(StorageError::CriticalZoneOpen);
        }
        *zone = Some(Vec::new());
        debug!("[rm-01] critical zone opened");
        Ok(())
    }

    /// Flush the zone's batch as one synced write and close the zone.
    ///
    /// The zone is closed even when the flush fails; the buffered writes are
    /// then lost and the caller must treat the block as not applied.
    pub fn release_critical_zone(&self) -> Result<(), StorageError> {
        let batch = self
            .zone
            .lock()
            .take()
            .ok_or(StorageError::NoCriticalZone)?;
        let ops = batch.len();
        self.engine.atomic_batch_write(batch, true)?;
        debug!(ops, "[rm-01] critical zone released");
        Ok(())
    }

    /// Whether a zone is currently open.
    pub fn in_critical_zone(&self) -> bool {
        self.zone.lock().is_some()
    }

    /// Number of operations buffered in the open zone.
    pub fn pending_operations(&self) -> usize {
        self.zone.lock().as_ref().map_or(0, Vec::len)
    }

    /// Shut the engine down.
    ///
    /// With `force` the open zone is discarded without touching the engine.
    /// Otherwise it is flushed first. The engine is closed in both cases.
    pub fn purge(&self, force: bool) -> Result<(), StorageError> {
        let mut zone = self.zone.lock();
        let pending = zone.take();

        let flushed = match (pending, force) {
            (Some(batch), true) => {
                warn!(discarded = batch.len(), "[rm-01] purging open critical zone");
                Ok(())
            }
            (Some(batch), false) => self.engine.atomic_batch_write(batch, true),
            (None, _) => Ok(()),
        };

        let closed = self.engine.close();
        info!(force, "[rm-01] storage purged");
        flushed?;
        closed?;
        Ok(())
    }

    /// Iterate every key starting with `prefix`.
    ///
    /// The upper bound is the prefix successor from [`reverse_seek_key`]; a
    /// reverse scan walks the same range from that bound downwards.
    pub fn iterate_prefix(&self, prefix: &[u8], reverse: bool) -> Result<Iter, StorageError> {
        let end = reverse_seek_key(prefix);
        let entries = self.engine.range_scan(prefix, end.as_deref())?;
        Ok(Iter::new(entries, prefix.len(), reverse))
    }

    /// Iterate `[start, end)`. Entries are stripped by `start.len()`.
    pub fn iterate_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        reverse: bool,
    ) -> Result<Iter, StorageError> {
        let entries = self.engine.range_scan(start, end)?;
        Ok(Iter::new(entries, start.len(), reverse))
    }
}

/// One key/value pair yielded by iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: Vec<u8>,
    value: Vec<u8>,
    prefix_len: usize,
}

impl Entry {
    /// The full stored key.
    pub fn document_key(&self) -> &[u8] {
        &self.key
    }

    /// The key with the iteration prefix removed.
    ///
    /// For index entries this is the primary id of the indexed document.
    pub fn stripped_key(&self) -> &[u8] {
        self.key.get(self.prefix_len..).unwrap_or_default()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }
}

/// Iterator over a scanned range.
pub struct Iter {
    entries: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
    prefix_len: usize,
    reverse: bool,
}

impl Iter {
    fn new(entries: Vec<(Vec<u8>, Vec<u8>)>, prefix_len: usize, reverse: bool) -> Self {
        Self {
            entries: entries.into_iter(),
            prefix_len,
            reverse,
        }
    }

    fn entry(&self, (key, value): (Vec<u8>, Vec<u8>)) -> Entry {
        Entry {
            key,
            value,
            prefix_len: self.prefix_len,
        }
    }
}

impl Iterator for Iter {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let raw = if self.reverse {
            self.entries.next_back()
        } else {
            self.entries.next()
        }?;
        Some(self.entry(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
