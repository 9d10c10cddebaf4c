//! # Transaction Indexer
//!
//! Stores every delivered transaction with its result under a sequential id
//! and indexes it by block height.
//!
//! ```text
//! tx 0x01 be(id)                          → IndexedTx (bincode)
//! tx 0x02 height 0x03 be(height) be(id)   → (empty)
//! seq:tx                                  → id lease
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use rm_01_kv_storage::keys::{
    document_group_prefix, document_key, encode_u64, index_key, index_value_prefix,
};
use rm_01_kv_storage::{Sequence, StorageDriver};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{IndexContext, Indexer};
use crate::errors::IndexerError;

const ENTITY: &str = "tx";
const HEIGHT_INDEX: &str = "height";
const SEQUENCE_KEY: &[u8] = b"seq:tx";

/// Ids reserved per lease write.
pub const DEFAULT_BANDWIDTH: u64 = 100;

/// A delivered transaction and its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedTx {
    pub id: u64,
    pub height: u64,
    /// Position in the block.
    pub index: u32,
    pub tx: Vec<u8>,
    pub code: u32,
    pub log: String,
    pub gas_used: i64,
}

pub struct TxIndexer {
    storage: Arc<StorageDriver>,
    sequence: Sequence,
}

impl TxIndexer {
    pub fn new(storage: Arc<StorageDriver>) -> Result<Self, IndexerError> {
        Self::with_bandwidth(storage, DEFAULT_BANDWIDTH)
    }

    pub fn with_bandwidth(storage: Arc<StorageDriver>, bandwidth: u64) -> Result<Self, IndexerError> {
        let sequence = Sequence::new(storage.clone(), SEQUENCE_KEY, bandwidth)?;
        Ok(Self { storage, sequence })
    }

    /// Committed transactions of block `height`, in block order.
    pub fn txs_at_height(&self, height: u64) -> Result<Vec<IndexedTx>, IndexerError> {
        let prefix = index_value_prefix(ENTITY, HEIGHT_INDEX, &encode_u64(height));
        let mut txs = Vec::new();
        for entry in self.storage.iterate_prefix(&prefix, false)? {
            let id = entry.stripped_key();
            if let Some(bytes) = self.storage.get(&document_key(ENTITY, id))? {
                txs.push(bincode::deserialize(&bytes)?);
            }
        }
        Ok(txs)
    }

    /// The `limit` most recently indexed transactions, newest first.
    pub fn latest_txs(&self, limit: usize) -> Result<Vec<IndexedTx>, IndexerError> {
        self.storage
            .iterate_prefix(&document_group_prefix(ENTITY), true)?
            .take(limit)
            .map(|entry| -> Result<IndexedTx, IndexerError> {
                Ok(bincode::deserialize(entry.value())?)
            })
            .collect()
    }

    /// Committed transaction by id.
    pub fn get(&self, id: u64) -> Result<Option<IndexedTx>, IndexerError> {
        match self.storage.get(&document_key(ENTITY, &encode_u64(id)))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Indexer for TxIndexer {
    fn name(&self) -> &'static str {
        "tx"
    }

    async fn index(&self, ctx: &IndexContext) -> Result<(), IndexerError> {
        let block_state = ctx.block_state().await?;
        let height = block_state.height;

        for (index, (tx, result)) in block_state.txs_with_results().enumerate() {
            let id = self.sequence.next()?;
            let record = IndexedTx {
                id,
                height,
                index: index as u32,
                tx: tx.clone(),
                code: result.code,
                log: result.log.clone(),
                gas_used: result.gas_used,
            };

            let id_bytes = encode_u64(id);
            self.storage
                .set(&document_key(ENTITY, &id_bytes), &bincode::serialize(&record)?)?;
            self.storage.set(
                &index_key(ENTITY, HEIGHT_INDEX, &encode_u64(height), &id_bytes),
                &[],
            )?;
        }

        debug!(
            height,
            txs = block_state.deliver_txs.len(),
            "[indexer:tx] block indexed"
        );
        Ok(())
    }

    fn release(&self) -> Result<(), IndexerError> {
        self.sequence.release()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rm_01_kv_storage::InMemoryKVStore;
    use rm_02_deps_resolver::DepsResolver;
    use shared_types::{AbciResponses, Block, BlockState, ResponseDeliverTx};

    fn block_state(height: u64, txs: &[&str]) -> BlockState {
        let mut block = Block::default();
        block.header.height = height;
        block.txs = txs.iter().map(|tx| tx.as_bytes().to_vec()).collect();
        let responses = AbciResponses {
            deliver_txs: txs
                .iter()
                .map(|_| ResponseDeliverTx::default())
                .collect(),
            ..Default::default()
        };
        BlockState::new(block, responses)
    }

    fn setup() -> (TxIndexer, IndexContext) {
        let storage = Arc::new(StorageDriver::new(Arc::new(InMemoryKVStore::new())));
        let indexer = TxIndexer::with_bandwidth(storage.clone(), 3).unwrap();
        let ctx = IndexContext::new(Arc::new(DepsResolver::new()), storage);
        (indexer, ctx)
    }

    async fn index_round(indexer: &TxIndexer, ctx: &IndexContext, state: BlockState) {
        ctx.resolver.dispose();
        ctx.resolver.emit(state).unwrap();
        indexer.index(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_indexes_txs_by_height() {
        let (indexer, ctx) = setup();
        index_round(&indexer, &ctx, block_state(1, &["a", "b"])).await;
        index_round(&indexer, &ctx, block_state(2, &["c"])).await;

        let at_one = indexer.txs_at_height(1).unwrap();
        assert_eq!(at_one.len(), 2);
        assert_eq!(at_one[0].tx, b"a".to_vec());
        assert_eq!(at_one[1].index, 1);

        let at_two = indexer.txs_at_height(2).unwrap();
        assert_eq!(at_two.len(), 1);
        assert_eq!(at_two[0].id, 2);
    }

    #[tokio::test]
    async fn test_latest_txs_newest_first() {
        let (indexer, ctx) = setup();
        index_round(&indexer, &ctx, block_state(1, &["a", "b", "c", "d"])).await;

        let ids: Vec<u64> = indexer
            .latest_txs(3)
            .unwrap()
            .into_iter()
            .map(|tx| tx.id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_writes_follow_the_zone() {
        let (indexer, ctx) = setup();
        ctx.storage.set_critical_zone().unwrap();
        index_round(&indexer, &ctx, block_state(1, &["a"])).await;
        assert!(indexer.get(0).unwrap().is_none());

        ctx.storage.release_critical_zone().unwrap();
        assert_eq!(indexer.get(0).unwrap().map(|tx| tx.height), Some(1));
    }

    #[tokio::test]
    async fn test_unresolved_round_is_an_error() {
        let (indexer, ctx) = setup();
        let waiting = {
            let ctx = ctx.clone();
            tokio::spawn(async move { indexer.index(&ctx).await })
        };
        while ctx.resolver.waiting(rm_02_deps_resolver::EntityKind::BlockState) == 0 {
            tokio::task::yield_now().await;
        }
        ctx.resolver.dispose();

        assert!(matches!(
            waiting.await.unwrap(),
            Err(IndexerError::Unresolved(_))
        ));
    }
}
