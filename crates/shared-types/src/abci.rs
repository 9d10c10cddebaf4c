//! # Application Boundary Records
//!
//! Requests and responses exchanged between the replica and the hosted
//! state-transition application, one pair per lifecycle call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entities::{
    Address, BlockHeader, BlockParams, ConsensusParams, EvidenceParams, Hash, PublicKey, Tx,
    ValidatorParams,
};

/// A key/value attribute on an emitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
    pub index: bool,
}

/// An event emitted by the application during a lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    /// Create an event with indexed attributes.
    pub fn new(kind: impl Into<String>, attributes: &[(&str, &str)]) -> Self {
        Self {
            kind: kind.into(),
            attributes: attributes
                .iter()
                .map(|(k, v)| EventAttribute {
                    key: (*k).to_string(),
                    value: (*v).to_string(),
                    index: true,
                })
                .collect(),
        }
    }
}

/// Validator power change. Power `0` removes the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: PublicKey,
    pub power: i64,
}

/// Partial consensus-parameter change returned by EndBlock.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsensusParamUpdates {
    pub block: Option<BlockParams>,
    pub evidence: Option<EvidenceParams>,
    pub validator: Option<ValidatorParams>,
}

impl ConsensusParamUpdates {
    /// True if no section changes.
    pub fn is_empty(&self) -> bool {
        self.block.is_none() && self.evidence.is_none() && self.validator.is_none()
    }
}

// =============================================================================
// INIT CHAIN
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInitChain {
    pub time: DateTime<Utc>,
    pub chain_id: String,
    pub consensus_params: ConsensusParams,
    pub validators: Vec<ValidatorUpdate>,
    pub app_state_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseInitChain {
    /// Overrides the genesis consensus params when set.
    pub consensus_params: Option<ConsensusParams>,
    /// Overrides the genesis validators when non-empty.
    pub validators: Vec<ValidatorUpdate>,
    pub app_hash: Vec<u8>,
}

// =============================================================================
// BEGIN BLOCK
// =============================================================================

/// One validator's participation in the previous block's commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub validator_address: Address,
    pub power: i64,
    pub signed_last_block: bool,
}

/// Participation of the whole previous validator set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LastCommitInfo {
    pub round: i32,
    pub votes: Vec<VoteInfo>,
}

/// Evidence translated for the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misbehavior {
    pub validator_address: Address,
    pub power: i64,
    pub height: u64,
    pub time: DateTime<Utc>,
    pub total_voting_power: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestBeginBlock {
    pub hash: Hash,
    pub header: BlockHeader,
    pub last_commit_info: LastCommitInfo,
    pub byzantine_validators: Vec<Misbehavior>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseBeginBlock {
    pub events: Vec<Event>,
}

// =============================================================================
// DELIVER TX
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDeliverTx {
    pub tx: Tx,
}

/// Per-transaction result. A non-zero code is a failed tx, not a failed block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseDeliverTx {
    pub code: u32,
    pub data: Vec<u8>,
    pub log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub events: Vec<Event>,
}

impl ResponseDeliverTx {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

// =============================================================================
// END BLOCK / COMMIT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEndBlock {
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseEndBlock {
    pub validator_updates: Vec<ValidatorUpdate>,
    pub consensus_param_updates: Option<ConsensusParamUpdates>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseCommit {
    /// Application state root after this block.
    pub data: Vec<u8>,
    pub retain_height: u64,
}

// =============================================================================
// QUERY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestQuery {
    pub path: String,
    pub data: Vec<u8>,
    /// `0` means latest.
    pub height: u64,
    pub prove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseQuery {
    pub code: u32,
    pub log: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub height: u64,
}

// =============================================================================
// AGGREGATE
// =============================================================================

/// Everything the application returned while executing one block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AbciResponses {
    pub begin_block: ResponseBeginBlock,
    pub deliver_txs: Vec<ResponseDeliverTx>,
    pub end_block: ResponseEndBlock,
}

impl AbciResponses {
    /// Hash over the deterministic part of every deliver result.
    pub fn results_hash(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for result in &self.deliver_txs {
            hasher.update(result.code.to_be_bytes());
            hasher.update((result.data.len() as u64).to_be_bytes());
            hasher.update(&result.data);
            hasher.update(result.gas_wanted.to_be_bytes());
            hasher.update(result.gas_used.to_be_bytes());
        }
        hasher.finalize().to_vec()
    }
}
