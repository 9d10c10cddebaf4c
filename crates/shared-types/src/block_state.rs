//! # Block State
//!
//! The per-height output of block execution, handed to indexers.

use serde::{Deserialize, Serialize};

use crate::abci::{AbciResponses, ResponseBeginBlock, ResponseDeliverTx, ResponseEndBlock};
use crate::entities::Block;

/// Result of applying one block. Discarded after indexing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockState {
    pub height: u64,
    pub block: Block,
    pub begin_block: ResponseBeginBlock,
    /// One entry per transaction, in block order.
    pub deliver_txs: Vec<ResponseDeliverTx>,
    pub end_block: ResponseEndBlock,
}

impl BlockState {
    /// Assemble from a block and the responses collected while executing it.
    pub fn new(block: Block, responses: AbciResponses) -> Self {
        Self {
            height: block.height(),
            block,
            begin_block: responses.begin_block,
            deliver_txs: responses.deliver_txs,
            end_block: responses.end_block,
        }
    }

    /// Pairs each transaction with its deliver result.
    pub fn txs_with_results(&self) -> impl Iterator<Item = (&Vec<u8>, &ResponseDeliverTx)> {
        self.block.txs.iter().zip(self.deliver_txs.iter())
    }
}
