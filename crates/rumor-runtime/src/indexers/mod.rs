//! # Indexers
//!
//! Consumers of each round's entities. The runtime awaits every registered
//! indexer after a block is applied and before the critical zone is
//! released, so whatever an indexer writes through the storage driver
//! commits atomically with the block.

pub mod tx_indexer;

use std::sync::Arc;

use async_trait::async_trait;
use rm_01_kv_storage::StorageDriver;
use rm_02_deps_resolver::{DepsResolver, EntityKind};
use shared_types::{BlockState, ChainState};

use crate::errors::IndexerError;

pub use tx_indexer::{IndexedTx, TxIndexer};

/// What an indexer sees while it runs.
#[derive(Clone)]
pub struct IndexContext {
    pub resolver: Arc<DepsResolver>,
    pub storage: Arc<StorageDriver>,
}

impl IndexContext {
    pub fn new(resolver: Arc<DepsResolver>, storage: Arc<StorageDriver>) -> Self {
        Self { resolver, storage }
    }

    /// This round's block state.
    pub async fn block_state(&self) -> Result<BlockState, IndexerError> {
        self.resolver
            .resolve_block_state()
            .await
            .ok_or(IndexerError::Unresolved(EntityKind::BlockState))
    }

    /// This round's chain state.
    pub async fn chain_state(&self) -> Result<ChainState, IndexerError> {
        self.resolver
            .resolve_chain_state()
            .await
            .ok_or(IndexerError::Unresolved(EntityKind::ChainState))
    }
}

/// A consumer of per-block entities.
#[async_trait]
pub trait Indexer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Index the current round. Writes land in the open critical zone.
    async fn index(&self, ctx: &IndexContext) -> Result<(), IndexerError>;

    /// Persist anything held in memory. Called once on clean shutdown.
    fn release(&self) -> Result<(), IndexerError> {
        Ok(())
    }
}
