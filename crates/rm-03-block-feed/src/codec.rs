//! # Wire Codec
//!
//! JSON shapes used by the ledger node's RPC, and their conversion to the
//! shared data model.
//!
//! | Field | Wire encoding |
//! |-------|---------------|
//! | heights, powers | decimal strings |
//! | hashes, addresses | uppercase hex, `""` for the empty id |
//! | transactions | standard base64 |
//! | commit slot | `block_id_flag` 1 = absent, 2 = commit, 3 = nil |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::base64::Base64;
use serde_with::formats::Uppercase;
use serde_with::hex::Hex;
use serde_with::{serde_as, DefaultOnNull, DisplayFromStr};
use shared_types::{Address, Block, BlockHeader, BlockId, Commit, CommitSig, Evidence, Hash};

use crate::errors::FeedError;
use crate::NEW_BLOCK_QUERY;

const BLOCK_ID_FLAG_ABSENT: u8 = 1;
const BLOCK_ID_FLAG_COMMIT: u8 = 2;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireBlockId {
    #[serde_as(as = "Hex<Uppercase>")]
    #[serde(default)]
    hash: Vec<u8>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireHeader {
    chain_id: String,
    #[serde_as(as = "DisplayFromStr")]
    height: u64,
    time: DateTime<Utc>,
    #[serde(default)]
    last_block_id: WireBlockId,
    #[serde_as(as = "Hex<Uppercase>")]
    #[serde(default)]
    app_hash: Vec<u8>,
    #[serde_as(as = "Hex<Uppercase>")]
    #[serde(default)]
    last_results_hash: Vec<u8>,
    #[serde_as(as = "Hex<Uppercase>")]
    #[serde(default)]
    proposer_address: Vec<u8>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireData {
    #[serde_as(as = "DefaultOnNull<Vec<Base64>>")]
    #[serde(default)]
    txs: Vec<Vec<u8>>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireVote {
    #[serde_as(as = "DisplayFromStr")]
    height: u64,
    #[serde_as(as = "Hex<Uppercase>")]
    validator_address: Vec<u8>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireDuplicateVote {
    vote_a: WireVote,
    #[serde_as(as = "DisplayFromStr")]
    total_voting_power: i64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEvidence {
    #[serde(rename = "type")]
    kind: String,
    value: WireDuplicateVote,
}

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireEvidenceList {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    evidence: Vec<WireEvidence>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireCommitSig {
    block_id_flag: u8,
    #[serde_as(as = "Hex<Uppercase>")]
    #[serde(default)]
    validator_address: Vec<u8>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireCommit {
    #[serde_as(as = "DisplayFromStr")]
    height: u64,
    round: i32,
    #[serde(default)]
    block_id: WireBlockId,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    signatures: Vec<WireCommitSig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireBlock {
    header: WireHeader,
    #[serde(default)]
    data: WireData,
    #[serde(default)]
    evidence: WireEvidenceList,
    last_commit: Option<WireCommit>,
}

/// JSON-RPC error envelope body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct EventResult {
    #[serde(default)]
    data: Option<EventData>,
}

#[derive(Debug, Deserialize)]
struct EventData {
    #[serde(rename = "type", default)]
    kind: String,
    value: EventValue,
}

#[derive(Debug, Deserialize)]
struct EventValue {
    #[serde(default)]
    block: Option<WireBlock>,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    block: WireBlock,
}

// =============================================================================
// CONVERSIONS
// =============================================================================

fn to_hash(bytes: &[u8], field: &str) -> Result<Hash, FeedError> {
    if bytes.is_empty() {
        return Ok([0u8; 32]);
    }
    bytes
        .try_into()
        .map_err(|_| FeedError::Decode(format!("{field}: expected 32 bytes, got {}", bytes.len())))
}

fn to_address(bytes: &[u8], field: &str) -> Result<Address, FeedError> {
    if bytes.is_empty() {
        return Ok([0u8; 20]);
    }
    bytes
        .try_into()
        .map_err(|_| FeedError::Decode(format!("{field}: expected 20 bytes, got {}", bytes.len())))
}

fn hash_or_empty(hash: &Hash) -> Vec<u8> {
    if hash == &[0u8; 32] {
        Vec::new()
    } else {
        hash.to_vec()
    }
}

impl TryFrom<WireBlock> for Block {
    type Error = FeedError;

    fn try_from(wire: WireBlock) -> Result<Self, FeedError> {
        let header = BlockHeader {
            chain_id: wire.header.chain_id,
            height: wire.header.height,
            time: wire.header.time,
            last_block_id: BlockId {
                hash: to_hash(&wire.header.last_block_id.hash, "last_block_id")?,
            },
            app_hash: wire.header.app_hash,
            last_results_hash: wire.header.last_results_hash,
            proposer_address: to_address(&wire.header.proposer_address, "proposer_address")?,
        };

        let evidence = wire
            .evidence
            .evidence
            .into_iter()
            .map(|ev| {
                Ok(Evidence {
                    height: ev.value.vote_a.height,
                    validator_address: to_address(&ev.value.vote_a.validator_address, "evidence")?,
                    time: ev.value.timestamp,
                    total_voting_power: ev.value.total_voting_power,
                })
            })
            .collect::<Result<Vec<_>, FeedError>>()?;

        let last_commit = match wire.last_commit {
            Some(commit) => Commit {
                height: commit.height,
                round: commit.round,
                signatures: commit
                    .signatures
                    .into_iter()
                    .map(|sig| {
                        Ok(CommitSig {
                            validator_address: to_address(&sig.validator_address, "signature")?,
                            absent: sig.block_id_flag == BLOCK_ID_FLAG_ABSENT,
                        })
                    })
                    .collect::<Result<Vec<_>, FeedError>>()?,
            },
            None => Commit::default(),
        };

        Ok(Block {
            header,
            txs: wire.data.txs,
            evidence,
            last_commit,
        })
    }
}

impl From<&Block> for WireBlock {
    fn from(block: &Block) -> Self {
        let header = &block.header;
        WireBlock {
            header: WireHeader {
                chain_id: header.chain_id.clone(),
                height: header.height,
                time: header.time,
                last_block_id: WireBlockId {
                    hash: hash_or_empty(&header.last_block_id.hash),
                },
                app_hash: header.app_hash.clone(),
                last_results_hash: header.last_results_hash.clone(),
                proposer_address: header.proposer_address.to_vec(),
            },
            data: WireData {
                txs: block.txs.clone(),
            },
            evidence: WireEvidenceList {
                evidence: block
                    .evidence
                    .iter()
                    .map(|ev| WireEvidence {
                        kind: "tendermint/DuplicateVoteEvidence".to_string(),
                        value: WireDuplicateVote {
                            vote_a: WireVote {
                                height: ev.height,
                                validator_address: ev.validator_address.to_vec(),
                            },
                            total_voting_power: ev.total_voting_power,
                            timestamp: ev.time,
                        },
                    })
                    .collect(),
            },
            last_commit: Some(WireCommit {
                height: block.last_commit.height,
                round: block.last_commit.round,
                block_id: WireBlockId {
                    hash: hash_or_empty(&header.last_block_id.hash),
                },
                signatures: block
                    .last_commit
                    .signatures
                    .iter()
                    .map(|sig| WireCommitSig {
                        block_id_flag: if sig.absent {
                            BLOCK_ID_FLAG_ABSENT
                        } else {
                            BLOCK_ID_FLAG_COMMIT
                        },
                        validator_address: if sig.absent {
                            Vec::new()
                        } else {
                            sig.validator_address.to_vec()
                        },
                    })
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// A decoded subscription frame.
#[derive(Debug)]
pub enum FeedMessage {
    /// A `NewBlock` event.
    Block(Box<Block>),
    /// Acknowledgements and events of other types.
    Ignored,
}

fn rpc_error(body: RpcErrorBody) -> FeedError {
    FeedError::Rpc {
        code: body.code,
        message: body.message,
        data: body.data,
    }
}

/// Decode one frame received on the subscription stream.
///
/// An error envelope is returned as [`FeedError::Rpc`].
pub fn decode_event(text: &str) -> Result<FeedMessage, FeedError> {
    let envelope: RpcEnvelope<EventResult> = serde_json::from_str(text)?;
    if let Some(error) = envelope.error {
        return Err(rpc_error(error));
    }

    let Some(data) = envelope.result.and_then(|result| result.data) else {
        return Ok(FeedMessage::Ignored);
    };
    match data.value.block {
        Some(block) => Ok(FeedMessage::Block(Box::new(block.try_into()?))),
        None => {
            tracing::debug!(kind = %data.kind, "[rm-03] ignoring non-block event");
            Ok(FeedMessage::Ignored)
        }
    }
}

/// Decode the response of `GET /block`.
pub fn decode_block_response(text: &str) -> Result<Block, FeedError> {
    let envelope: RpcEnvelope<BlockResult> = serde_json::from_str(text)?;
    if let Some(error) = envelope.error {
        return Err(rpc_error(error));
    }
    let result = envelope
        .result
        .ok_or_else(|| FeedError::Decode("missing result".to_string()))?;
    result.block.try_into()
}

// =============================================================================
// ENCODING
// =============================================================================

/// The subscribe request sent after connecting.
pub fn subscribe_request() -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "subscribe",
        "id": 0,
        "params": { "query": NEW_BLOCK_QUERY },
    })
    .to_string()
}

/// The acknowledgement the node sends after a subscribe request.
pub fn encode_subscribe_ack() -> String {
    json!({ "jsonrpc": "2.0", "id": 0, "result": {} }).to_string()
}

/// A `NewBlock` event frame carrying `block`.
pub fn encode_new_block_event(block: &Block) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 0,
        "result": {
            "query": NEW_BLOCK_QUERY,
            "data": {
                "type": "tendermint/event/NewBlock",
                "value": { "block": WireBlock::from(block) },
            },
        },
    })
    .to_string()
}

/// The `GET /block` response body for `block`.
pub fn encode_block_response(block: &Block) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": -1,
        "result": {
            "block_id": { "hash": hex_upper(&block.hash()) },
            "block": WireBlock::from(block),
        },
    })
    .to_string()
}

/// An error envelope.
pub fn encode_error(code: i64, message: &str, data: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 0,
        "error": { "code": code, "message": message, "data": data },
    })
    .to_string()
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
