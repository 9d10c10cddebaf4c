//! # Resolver Rounds
//!
//! Indexers exchange derived entities through the resolver within one block's
//! round, and each round starts empty.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rm_01_kv_storage::{InMemoryKVStore, StorageDriver};
    use rm_02_deps_resolver::{EntityKind, ResolverError, RoundEntity};
    use rm_04_mantlemint::test_utils::TestChain;
    use rm_04_mantlemint::{ExecutorKind, KvStoreApp, ReplayPolicy};
    use rumor_runtime::{IndexContext, Indexer, IndexerError, Mantle};
    use serde_json::json;

    const TX_COUNT: &str = "tx_count";

    // =========================================================================
    // FIXTURES
    // =========================================================================

    /// Publishes the number of transactions in the round's block.
    struct TxCounter;

    #[async_trait]
    impl Indexer for TxCounter {
        fn name(&self) -> &'static str {
            "tx-counter"
        }

        async fn index(&self, ctx: &IndexContext) -> Result<(), IndexerError> {
            let block_state = ctx.block_state().await?;
            let count = block_state.block.txs.len();
            ctx.resolver
                .emit(RoundEntity::custom(TX_COUNT, json!(count)))?;
            Ok(())
        }
    }

    /// Consumes the counter's entity together with the chain state.
    #[derive(Default)]
    struct Summary {
        rows: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl Indexer for Summary {
        fn name(&self) -> &'static str {
            "summary"
        }

        async fn index(&self, ctx: &IndexContext) -> Result<(), IndexerError> {
            let chain_state = ctx.chain_state().await?;
            let count = match ctx.resolver.resolve(EntityKind::Custom(TX_COUNT)).await {
                Some(RoundEntity::Custom { value, .. }) => value.as_u64().unwrap_or_default(),
                _ => return Err(IndexerError::Unresolved(EntityKind::Custom(TX_COUNT))),
            };
            self.rows.lock().push((chain_state.last_block_height, count));
            Ok(())
        }
    }

    fn mantle() -> Mantle {
        let storage = Arc::new(StorageDriver::new(Arc::new(InMemoryKVStore::new())));
        let app = KvStoreApp::new(storage.clone()).unwrap();
        Mantle::new(
            Box::new(app),
            storage,
            &TestChain::genesis(),
            ExecutorKind::Standard,
            ReplayPolicy::Trusted,
        )
        .unwrap()
    }

    // =========================================================================
    // TESTS
    // =========================================================================

    #[tokio::test]
    async fn test_indexers_share_round_entities() {
        let summary = Arc::new(Summary::default());
        let mantle = mantle()
            .with_indexer(Arc::new(TxCounter))
            .with_indexer(summary.clone());

        mantle.inject(&TestChain::block(1)).await.unwrap();
        let block = TestChain::block_with_txs(2, vec![b"a=1".to_vec(), b"b=2".to_vec()]);
        mantle.inject(&block).await.unwrap();

        assert_eq!(*summary.rows.lock(), vec![(1, 1), (2, 2)]);
    }

    #[tokio::test]
    async fn test_export_states_reflects_last_round() {
        let mantle = mantle().with_indexer(Arc::new(TxCounter));
        mantle.inject(&TestChain::block(1)).await.unwrap();

        let states = mantle.export_states();
        let mut kinds: Vec<&str> = states.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec!["BlockState", "ChainState", TX_COUNT]);
        assert_eq!(
            states["BlockState"].as_block_state().map(|s| s.height),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_genesis_state_predefined() {
        let mantle = mantle();

        let latest = mantle.resolver().resolve_latest(EntityKind::ChainState);
        let state = latest.as_ref().and_then(RoundEntity::as_chain_state).unwrap();
        assert_eq!(state.chain_id, TestChain::CHAIN_ID);
        assert_eq!(state.last_block_height, 0);
    }

    #[tokio::test]
    async fn test_second_emit_in_round_rejected() {
        let mantle = mantle().with_indexer(Arc::new(TxCounter));
        mantle.inject(&TestChain::block(1)).await.unwrap();

        let again = mantle
            .resolver()
            .emit(RoundEntity::custom(TX_COUNT, json!(7)));
        assert!(matches!(again, Err(ResolverError::AlreadyCommitted { .. })));

        let latest = mantle
            .resolver()
            .resolve_latest(EntityKind::Custom(TX_COUNT));
        assert!(matches!(latest, Some(RoundEntity::Custom { value, .. }) if value == json!(1)));
    }
}
