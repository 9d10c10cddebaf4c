//! # Catch-up Flow
//!
//! Live feed blocks with a gap are bridged through the block source, and every
//! bridged block is indexed exactly like a live one.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rm_01_kv_storage::{InMemoryKVStore, StorageDriver};
    use rm_03_block_feed::test_utils::MockBlockSource;
    use rm_04_mantlemint::test_utils::TestChain;
    use rm_04_mantlemint::{ExecutorKind, KvStoreApp, ReplayPolicy};
    use rumor_runtime::{
        IndexContext, Indexer, IndexerError, Mantle, SyncConfig, SyncError, SyncOrchestrator,
        TxIndexer,
    };
    use shared_types::Block;
    use tokio::sync::mpsc;

    // =========================================================================
    // FIXTURES
    // =========================================================================

    /// Records every committed height in order.
    #[derive(Default)]
    struct HeightLog {
        heights: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl Indexer for HeightLog {
        fn name(&self) -> &'static str {
            "height-log"
        }

        async fn index(&self, ctx: &IndexContext) -> Result<(), IndexerError> {
            let block_state = ctx.block_state().await?;
            self.heights.lock().push(block_state.height);
            Ok(())
        }
    }

    struct Node {
        mantle: Arc<Mantle>,
        txs: Arc<TxIndexer>,
        log: Arc<HeightLog>,
    }

    fn node() -> Node {
        let storage = Arc::new(StorageDriver::new(Arc::new(InMemoryKVStore::new())));
        let app = KvStoreApp::new(storage.clone()).unwrap();
        let txs = Arc::new(TxIndexer::new(storage.clone()).unwrap());
        let log = Arc::new(HeightLog::default());
        let mantle = Mantle::new(
            Box::new(app),
            storage,
            &TestChain::genesis(),
            ExecutorKind::Standard,
            ReplayPolicy::Trusted,
        )
        .unwrap()
        .with_indexer(txs.clone())
        .with_indexer(log.clone());

        Node {
            mantle: Arc::new(mantle),
            txs,
            log,
        }
    }

    fn live(blocks: Vec<Block>) -> mpsc::Receiver<Block> {
        let (sender, receiver) = mpsc::channel(blocks.len().max(1));
        for block in blocks {
            sender.try_send(block).unwrap();
        }
        receiver
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    /// Heights 1, 2, 3 arrive live, then 6: the tip is asked for and 4..=6 are
    /// fetched, so the live 6 is already applied.
    #[tokio::test]
    async fn test_gap_bridged_before_live_block() {
        let node = node();
        let source = Arc::new(MockBlockSource::new((1..=6).map(TestChain::block)));
        let sync = SyncOrchestrator::new(node.mantle.clone(), source.clone(), SyncConfig::for_testing());

        let feed = live([1, 2, 3, 6].into_iter().map(TestChain::block).collect());
        let result = sync.run(feed).await;

        assert!(matches!(result, Err(SyncError::FeedClosed)));
        assert_eq!(source.requests(), vec![None, Some(4), Some(5), Some(6)]);
        assert_eq!(*node.log.heights.lock(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(node.mantle.last_height().await, 6);
    }

    #[tokio::test]
    async fn test_bridged_blocks_are_indexed() {
        let node = node();
        let source = Arc::new(MockBlockSource::new((1..=4).map(TestChain::block)));
        let sync = SyncOrchestrator::new(node.mantle.clone(), source, SyncConfig::for_testing());

        let _ = sync.run(live(vec![TestChain::block(4)])).await;

        for height in 1..=4 {
            let txs = node.txs.txs_at_height(height).unwrap();
            assert_eq!(txs.len(), 1, "height {height}");
            assert_eq!(txs[0].tx, format!("tx-{height}").into_bytes());
        }
        let latest: Vec<u64> = node
            .txs
            .latest_txs(2)
            .unwrap()
            .into_iter()
            .map(|tx| tx.height)
            .collect();
        assert_eq!(latest, vec![4, 3]);
    }

    /// Repeated and out-of-order live blocks never break the height run.
    #[tokio::test]
    async fn test_heights_stay_contiguous() {
        let node = node();
        let source = Arc::new(MockBlockSource::new((1..=9).map(TestChain::block)));
        let sync = SyncOrchestrator::new(node.mantle.clone(), source, SyncConfig::for_testing());

        let feed = live([2, 2, 5, 3, 4, 5, 9, 7].into_iter().map(TestChain::block).collect());
        let _ = sync.run(feed).await;

        let heights = node.log.heights.lock().clone();
        assert_eq!(heights, (1..=9).collect::<Vec<_>>());
    }
}
