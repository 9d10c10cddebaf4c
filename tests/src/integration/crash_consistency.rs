//! # Crash Consistency
//!
//! A block whose injection dies midway leaves no trace after a restart: not in
//! the replica's chain state, not in the application, not in any indexer.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rm_01_kv_storage::keys::decode_u64;
    use rm_01_kv_storage::{InMemoryKVStore, Sequence, StorageDriver};
    use rm_04_mantlemint::test_utils::{FaultyApp, TestChain};
    use rm_04_mantlemint::{Application, ExecutorKind, KvStoreApp, ReplayPolicy};
    use rumor_runtime::{InjectError, LocalClient, Mantle, TxIndexer};
    use shared_types::Block;

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn kv_block(height: u64) -> Block {
        TestChain::block_with_txs(height, vec![format!("key{height}=value{height}").into_bytes()])
    }

    fn start(
        store: &Arc<InMemoryKVStore>,
        app: impl FnOnce(Arc<StorageDriver>) -> Box<dyn Application>,
    ) -> (Mantle, Arc<TxIndexer>) {
        let storage = Arc::new(StorageDriver::new(store.clone()));
        let txs = Arc::new(TxIndexer::new(storage.clone()).unwrap());
        let mantle = Mantle::new(
            app(storage.clone()),
            storage,
            &TestChain::genesis(),
            ExecutorKind::Standard,
            ReplayPolicy::Trusted,
        )
        .unwrap()
        .with_indexer(txs.clone());
        (mantle, txs)
    }

    fn kvstore(storage: Arc<StorageDriver>) -> Box<dyn Application> {
        Box::new(KvStoreApp::new(storage).unwrap())
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_panicked_block_invisible_after_restart() {
        let store = Arc::new(InMemoryKVStore::new());
        {
            let (mantle, _) = start(&store, |s| Box::new(FaultyApp::panicking_at(s, 3)));
            mantle.inject(&kv_block(1)).await.unwrap();
            mantle.inject(&kv_block(2)).await.unwrap();

            let err = mantle.inject(&kv_block(3)).await.unwrap_err();
            assert!(matches!(err, InjectError::Fatal { height: 3, .. }));
            assert!(store.is_closed());
        }

        let store = Arc::new(store.reopen());
        let (mantle, txs) = start(&store, kvstore);

        assert_eq!(mantle.last_height().await, 2);
        assert_eq!(txs.txs_at_height(2).unwrap().len(), 1);
        assert!(txs.txs_at_height(3).unwrap().is_empty());

        let client = LocalClient::new(&mantle);
        let kept = client.query("/store", b"key2", 0).await.unwrap();
        assert_eq!(kept.value, b"value2".to_vec());
        let torn = client.query("/store", b"key3", 0).await.unwrap();
        assert!(torn.value.is_empty());

        // The same block applies cleanly once the fault is gone.
        mantle.inject(&kv_block(3)).await.unwrap();
        assert_eq!(txs.txs_at_height(3).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_block_keeps_earlier_blocks() {
        let store = Arc::new(InMemoryKVStore::new());
        let (mantle, txs) = start(&store, |s| Box::new(FaultyApp::failing_at(s, 2)));

        mantle.inject(&kv_block(1)).await.unwrap();
        let err = mantle.inject(&kv_block(2)).await.unwrap_err();

        assert!(!err.is_fatal());
        assert!(!store.is_closed());
        assert_eq!(mantle.last_height().await, 1);
        assert_eq!(txs.txs_at_height(1).unwrap().len(), 1);
        assert!(txs.txs_at_height(2).unwrap().is_empty());
    }

    /// Tx ids never repeat across a crash, and a clean stop loses none.
    #[tokio::test]
    async fn test_tx_ids_survive_restarts() {
        let store = Arc::new(InMemoryKVStore::new());
        {
            let (mantle, _) = start(&store, kvstore);
            mantle.inject(&kv_block(1)).await.unwrap();
            mantle.inject(&kv_block(2)).await.unwrap();
            mantle.shutdown(false).await.unwrap();
        }

        let store = Arc::new(store.reopen());
        let first_after_clean = {
            let (mantle, txs) = start(&store, kvstore);
            mantle.inject(&kv_block(3)).await.unwrap();
            let id = txs.txs_at_height(3).unwrap()[0].id;
            mantle.shutdown(true).await.unwrap();
            id
        };
        assert_eq!(first_after_clean, 2);

        let store = Arc::new(store.reopen());
        let (mantle, txs) = start(&store, kvstore);
        mantle.inject(&kv_block(4)).await.unwrap();
        let first_after_crash = txs.txs_at_height(4).unwrap()[0].id;
        assert!(first_after_crash > first_after_clean);

        let lease = StorageDriver::new(store.clone())
            .get(b"seq:tx")
            .unwrap()
            .and_then(|raw| decode_u64(&raw))
            .unwrap();
        assert!(lease > first_after_crash);
    }

    #[test]
    fn test_sequence_boundary_respected_after_release() {
        let store = Arc::new(InMemoryKVStore::new());
        let driver = Arc::new(StorageDriver::new(store.clone()));
        let sequence = Sequence::new(driver, b"seq:a".to_vec(), 3).unwrap();
        let handed_out: Vec<u64> = (0..5).map(|_| sequence.next().unwrap()).collect();
        sequence.release().unwrap();

        let reopened = Arc::new(StorageDriver::new(Arc::new(store.reopen())));
        let resumed = Sequence::new(reopened, b"seq:a".to_vec(), 3).unwrap();
        let next = resumed.next().unwrap();
        assert!(handed_out.iter().all(|id| *id < next));
    }
}
