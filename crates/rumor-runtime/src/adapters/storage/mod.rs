//! # Storage Adapters
//!
//! Engines behind the `KeyValueStore` port.
//!
//! Enable the `rocksdb` feature for the persistent engine:
//!
//! ```toml
//! rumor-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! Without it the runtime keeps everything in memory.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

use std::sync::Arc;

use rm_01_kv_storage::{KVStoreError, KeyValueStore, StorageDriver};
#[cfg(not(feature = "rocksdb"))]
use tracing::warn;

use crate::container::config::StorageConfig;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

pub use rm_01_kv_storage::InMemoryKVStore;

/// Open the configured engine and wrap it in a storage driver.
pub fn open_storage(config: &StorageConfig) -> Result<Arc<StorageDriver>, KVStoreError> {
    let engine = open_engine(config)?;
    Ok(Arc::new(StorageDriver::new(engine)))
}

#[cfg(feature = "rocksdb")]
fn open_engine(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, KVStoreError> {
    std::fs::create_dir_all(&config.data_dir).map_err(|e| KVStoreError::Database {
        message: format!("cannot create {}: {e}", config.data_dir.display()),
    })?;
    let store = RocksDbStore::open(RocksDbConfig {
        path: config.data_dir.join("rumor.db"),
        sync_writes: config.sync_writes,
        ..Default::default()
    })?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_engine(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, KVStoreError> {
    warn!(
        data_dir = %config.data_dir.display(),
        "[storage] built without rocksdb, state is kept in memory only"
    );
    Ok(Arc::new(InMemoryKVStore::new()))
}
