//! Test helpers: block builders and a scripted [`BlockSource`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::RwLock;
use shared_types::{Block, BlockHeader};

use crate::errors::FeedError;
use crate::fetcher::BlockSource;

/// Chain id used by [`block_at`].
pub const TEST_CHAIN_ID: &str = "rumor-test";

/// A minimal block at `height` with one transaction.
pub fn block_at(height: u64) -> Block {
    Block {
        header: BlockHeader {
            chain_id: TEST_CHAIN_ID.to_string(),
            height,
            time: Utc
                .timestamp_opt(1_700_000_000 + height as i64, 0)
                .single()
                .unwrap_or_default(),
            ..Default::default()
        },
        txs: vec![format!("tx-{height}").into_bytes()],
        ..Default::default()
    }
}

/// In-memory [`BlockSource`] serving a fixed set of blocks.
#[derive(Default)]
pub struct MockBlockSource {
    blocks: RwLock<BTreeMap<u64, Block>>,
    failures: AtomicUsize,
    requests: RwLock<Vec<Option<u64>>>,
}

impl MockBlockSource {
    pub fn new(blocks: impl IntoIterator<Item = Block>) -> Self {
        let source = Self::default();
        for block in blocks {
            source.insert(block);
        }
        source
    }

    pub fn insert(&self, block: Block) {
        self.blocks.write().insert(block.height(), block);
    }

    /// Fail the next `count` requests with a transport error.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Every requested height, `None` for latest.
    pub fn requests(&self) -> Vec<Option<u64>> {
        self.requests.read().clone()
    }
}

#[async_trait]
impl BlockSource for MockBlockSource {
    async fn fetch_block(&self, height: Option<u64>) -> Result<Block, FeedError> {
        self.requests.write().push(height);

        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FeedError::Transport("injected failure".to_string()));
        }

        let blocks = self.blocks.read();
        let block = match height {
            Some(height) => blocks.get(&height),
            None => blocks.values().next_back(),
        };
        block.cloned().ok_or_else(|| FeedError::Rpc {
            code: -32603,
            message: "block not found".to_string(),
            data: format!("{height:?}"),
        })
    }
}
