//! # Application Port
//!
//! The black-box state-transition function. The replica only threads its
//! outputs into chain state and the block execution result.

use shared_types::{
    RequestBeginBlock, RequestDeliverTx, RequestEndBlock, RequestInitChain, RequestQuery,
    ResponseBeginBlock, ResponseCommit, ResponseDeliverTx, ResponseEndBlock, ResponseInitChain,
    ResponseQuery,
};

use crate::errors::ApplicationError;

/// Lifecycle of a hosted application.
///
/// Calls for one block always arrive as `begin_block`, `deliver_tx` once per
/// transaction in block order, `end_block`, then `commit`.
pub trait Application: Send {
    /// Called once, when the replica starts from genesis.
    fn init_chain(&mut self, request: RequestInitChain)
        -> Result<ResponseInitChain, ApplicationError>;

    fn begin_block(
        &mut self,
        request: RequestBeginBlock,
    ) -> Result<ResponseBeginBlock, ApplicationError>;

    /// A rejected transaction is a non-zero `code`, not an `Err`.
    fn deliver_tx(&mut self, request: RequestDeliverTx)
        -> Result<ResponseDeliverTx, ApplicationError>;

    fn end_block(&mut self, request: RequestEndBlock) -> Result<ResponseEndBlock, ApplicationError>;

    /// Persist the block's effects and return the new state root.
    fn commit(&mut self) -> Result<ResponseCommit, ApplicationError>;

    /// Read committed application state.
    fn query(&self, request: RequestQuery) -> Result<ResponseQuery, ApplicationError>;
}
