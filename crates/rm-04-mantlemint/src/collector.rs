//! # Event Collector
//!
//! Gathers the application's responses while one block executes. A new
//! collector is created for every injected block.

use shared_types::{
    AbciResponses, Block, BlockState, ResponseBeginBlock, ResponseDeliverTx, ResponseEndBlock,
};

/// Sink for per-block execution events.
pub trait BlockEventPublisher {
    fn publish_begin_block(&mut self, response: &ResponseBeginBlock);

    /// Called once per transaction, in block order.
    fn publish_tx(&mut self, index: usize, response: &ResponseDeliverTx);

    fn publish_end_block(&mut self, response: &ResponseEndBlock);
}

/// Collects one block's responses into a [`BlockState`].
#[derive(Debug, Default)]
pub struct EventCollector {
    responses: AbciResponses,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tx_count(&self) -> usize {
        self.responses.deliver_txs.len()
    }

    /// Finish collection for `block`.
    pub fn into_block_state(self, block: Block) -> BlockState {
        BlockState::new(block, self.responses)
    }
}

impl BlockEventPublisher for EventCollector {
    fn publish_begin_block(&mut self, response: &ResponseBeginBlock) {
        self.responses.begin_block = response.clone();
    }

    fn publish_tx(&mut self, index: usize, response: &ResponseDeliverTx) {
        debug_assert_eq!(index, self.responses.deliver_txs.len());
        self.responses.deliver_txs.push(response.clone());
    }

    fn publish_end_block(&mut self, response: &ResponseEndBlock) {
        self.responses.end_block = response.clone();
    }
}
