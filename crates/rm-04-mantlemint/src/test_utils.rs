//! Fixtures shared by replica tests and downstream crates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rm_01_kv_storage::StorageDriver;
use shared_types::{
    address_from_pub_key, Block, BlockHeader, Commit, CommitSig, GenesisDoc, GenesisValidator,
    RequestBeginBlock, RequestDeliverTx, RequestEndBlock, RequestInitChain, RequestQuery,
    ResponseBeginBlock, ResponseCommit, ResponseDeliverTx, ResponseEndBlock, ResponseInitChain,
    ResponseQuery,
};

use crate::apps::kvstore::KvStoreApp;
use crate::errors::ApplicationError;
use crate::ports::app::Application;

/// A single-validator chain whose blocks carry one transaction each.
pub struct TestChain;

impl TestChain {
    pub const CHAIN_ID: &'static str = "rumor-test";
    pub const VALIDATOR_KEY: [u8; 32] = [1u8; 32];
    pub const VALIDATOR_POWER: i64 = 10;

    pub fn genesis_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_600_000_000, 0).unwrap_or_default()
    }

    pub fn genesis() -> GenesisDoc {
        GenesisDoc {
            genesis_time: Self::genesis_time(),
            chain_id: Self::CHAIN_ID.into(),
            consensus_params: None,
            validators: vec![GenesisValidator {
                pub_key: Self::VALIDATOR_KEY,
                power: Self::VALIDATOR_POWER,
                name: "val-0".into(),
            }],
            app_hash: Vec::new(),
            app_state: serde_json::Value::Null,
        }
    }

    /// Block at `height` carrying the transaction `tx-<height>`.
    pub fn block(height: u64) -> Block {
        Self::block_with_txs(height, vec![format!("tx-{height}").into_bytes()])
    }

    pub fn block_with_txs(height: u64, txs: Vec<Vec<u8>>) -> Block {
        let address = address_from_pub_key(&Self::VALIDATOR_KEY);
        let last_commit = if height > 1 {
            Commit {
                height: height - 1,
                round: 0,
                signatures: vec![CommitSig {
                    validator_address: address,
                    absent: false,
                }],
            }
        } else {
            Commit::default()
        };

        Block {
            header: BlockHeader {
                chain_id: Self::CHAIN_ID.into(),
                height,
                time: Self::genesis_time() + chrono::Duration::seconds(height as i64),
                proposer_address: address,
                ..Default::default()
            },
            txs,
            evidence: Vec::new(),
            last_commit,
        }
    }
}

/// Failure injected by [`FaultyApp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Error,
    Panic,
}

/// [`KvStoreApp`] that fails or panics in `begin_block` at one height.
pub struct FaultyApp {
    inner: KvStoreApp,
    height: u64,
    fault: Fault,
}

impl FaultyApp {
    pub fn failing_at(driver: Arc<StorageDriver>, height: u64) -> Self {
        Self::new(driver, height, Fault::Error)
    }

    pub fn panicking_at(driver: Arc<StorageDriver>, height: u64) -> Self {
        Self::new(driver, height, Fault::Panic)
    }

    fn new(driver: Arc<StorageDriver>, height: u64, fault: Fault) -> Self {
        let inner = match KvStoreApp::new(driver) {
            Ok(app) => app,
            Err(err) => panic!("kvstore over test driver: {err}"),
        };
        Self {
            inner,
            height,
            fault,
        }
    }
}

impl Application for FaultyApp {
    fn init_chain(
        &mut self,
        request: RequestInitChain,
    ) -> Result<ResponseInitChain, ApplicationError> {
        self.inner.init_chain(request)
    }

    fn begin_block(
        &mut self,
        request: RequestBeginBlock,
    ) -> Result<ResponseBeginBlock, ApplicationError> {
        if request.header.height == self.height {
            match self.fault {
                Fault::Error => {
                    return Err(ApplicationError::new(format!(
                        "rejected block {}",
                        self.height
                    )))
                }
                Fault::Panic => panic!("application crashed at height {}", self.height),
            }
        }
        self.inner.begin_block(request)
    }

    fn deliver_tx(
        &mut self,
        request: RequestDeliverTx,
    ) -> Result<ResponseDeliverTx, ApplicationError> {
        self.inner.deliver_tx(request)
    }

    fn end_block(&mut self, request: RequestEndBlock) -> Result<ResponseEndBlock, ApplicationError> {
        self.inner.end_block(request)
    }

    fn commit(&mut self) -> Result<ResponseCommit, ApplicationError> {
        self.inner.commit()
    }

    fn query(&self, request: RequestQuery) -> Result<ResponseQuery, ApplicationError> {
        self.inner.query(request)
    }
}
