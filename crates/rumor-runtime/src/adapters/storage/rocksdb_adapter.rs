//! # RocksDB Storage Adapter
//!
//! Persistent implementation of the KeyValueStore trait.
//!
//! ## Features
//!
//! - Atomic batch writes (WriteBatch), fsynced when the caller asks
//! - Snappy compression
//! - Bloom filters for point lookups
//! - Explicit close: the handle is dropped and later calls fail

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use rm_01_kv_storage::{BatchOperation, KVStoreError, KeyValueStore};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use tracing::info;

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 256MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 64MB)
    pub write_buffer_size: usize,
    /// Maximum number of write buffers (default: 3)
    pub max_write_buffer_number: i32,
    /// Fsync single puts and deletes. Batches follow the caller's flag.
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/rocksdb"),
            block_cache_size: 256 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store implementing the KeyValueStore trait
pub struct RocksDbStore {
    db: RwLock<Option<DB>>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create a RocksDB database
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| db_error("open", e))?;
        info!(path = %config.path.display(), "[storage] RocksDB opened");

        Ok(Self {
            db: RwLock::new(Some(db)),
            config,
        })
    }

    fn write_options(sync: bool) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(sync);
        write_opts
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(KVStoreError::Closed)?;
        db.get(key).map_err(|e| db_error("get", e))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(KVStoreError::Closed)?;
        db.put_opt(key, value, &Self::write_options(self.config.sync_writes))
            .map_err(|e| db_error("put", e))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(KVStoreError::Closed)?;
        db.delete_opt(key, &Self::write_options(self.config.sync_writes))
            .map_err(|e| db_error("delete", e))
    }

    fn atomic_batch_write(
        &self,
        operations: Vec<BatchOperation>,
        sync: bool,
    ) -> Result<(), KVStoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(KVStoreError::Closed)?;

        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }

        db.write_opt(batch, &Self::write_options(sync))
            .map_err(|e| db_error("batch write", e))
    }

    fn range_scan(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(KVStoreError::Closed)?;

        let mut results = Vec::new();
        for item in db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item.map_err(|e| db_error("scan", e))?;
            if end.is_some_and(|end| &key[..] >= end) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn close(&self) -> Result<(), KVStoreError> {
        if let Some(db) = self.db.write().take() {
            db.flush().map_err(|e| db_error("flush", e))?;
            info!(path = %self.config.path.display(), "[storage] RocksDB closed");
        }
        Ok(())
    }
}

fn db_error(op: &str, err: rocksdb::Error) -> KVStoreError {
    KVStoreError::Database {
        message: format!("RocksDB {op} failed: {err}"),
    }
}
