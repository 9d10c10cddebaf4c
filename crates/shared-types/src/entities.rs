//! # Core Domain Entities
//!
//! Blocks as delivered by the upstream ledger node, and the mutable chain
//! state the replica threads through every block application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::abci::{ConsensusParamUpdates, ValidatorUpdate};
use crate::errors::{ConsensusParamsError, ValidatorSetError};

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte validator address (first 20 bytes of the SHA-256 of the key).
pub type Address = [u8; 20];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// An opaque transaction as carried in a block.
pub type Tx = Vec<u8>;

/// Derive a validator address from its public key.
pub fn address_from_pub_key(pub_key: &PublicKey) -> Address {
    let digest = Sha256::digest(pub_key);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[..20]);
    address
}

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// Identifies a block by its hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockId {
    /// Block hash.
    pub hash: Hash,
}

impl BlockId {
    /// Whether this is the empty id carried by the first block.
    pub fn is_zero(&self) -> bool {
        self.hash == [0u8; 32]
    }
}

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain identifier.
    pub chain_id: String,
    /// Block height, strictly increasing from 1.
    pub height: u64,
    /// Block time as agreed by the proposer.
    pub time: DateTime<Utc>,
    /// Id of the previous block (zero for height 1).
    pub last_block_id: BlockId,
    /// Application state root after executing the previous block.
    pub app_hash: Vec<u8>,
    /// Hash of the previous block's deliver results.
    pub last_results_hash: Vec<u8>,
    /// Address of the proposer.
    pub proposer_address: Address,
}

/// A validator's signature slot in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSig {
    /// Address of the validator owning this slot.
    pub validator_address: Address,
    /// True if the validator did not sign the previous block.
    pub absent: bool,
}

/// The commit for the previous block, embedded in the next block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Commit {
    /// Height of the committed block.
    pub height: u64,
    /// Consensus round the commit was formed in.
    pub round: i32,
    /// One slot per validator of the committed height, in validator-set order.
    pub signatures: Vec<CommitSig>,
}

impl Commit {
    /// Number of signature slots.
    pub fn size(&self) -> usize {
        self.signatures.len()
    }
}

/// Evidence of validator misbehaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Height at which the misbehaviour happened.
    pub height: u64,
    /// Offending validator.
    pub validator_address: Address,
    /// Time of the misbehaviour.
    pub time: DateTime<Utc>,
    /// Total voting power of the validator set at that height.
    pub total_voting_power: i64,
}

/// A committed block. Immutable once produced upstream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Ordered, opaque transactions.
    pub txs: Vec<Tx>,
    /// Evidence of misbehaviour included by the proposer.
    pub evidence: Vec<Evidence>,
    /// Commit of the previous block.
    pub last_commit: Commit,
}

impl Block {
    /// Block height.
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Deterministic hash of the header.
    pub fn hash(&self) -> Hash {
        let header = &self.header;
        let mut hasher = Sha256::new();
        hasher.update(header.chain_id.as_bytes());
        hasher.update(header.height.to_be_bytes());
        hasher.update(header.time.timestamp().to_be_bytes());
        hasher.update(header.time.timestamp_subsec_nanos().to_be_bytes());
        hasher.update(header.last_block_id.hash);
        hasher.update((header.app_hash.len() as u64).to_be_bytes());
        hasher.update(&header.app_hash);
        hasher.update((header.last_results_hash.len() as u64).to_be_bytes());
        hasher.update(&header.last_results_hash);
        hasher.update(header.proposer_address);
        hasher.update((self.txs.len() as u64).to_be_bytes());
        for tx in &self.txs {
            hasher.update(Sha256::digest(tx));
        }
        hasher.finalize().into()
    }

    /// Id of this block.
    pub fn block_id(&self) -> BlockId {
        BlockId { hash: self.hash() }
    }
}

// =============================================================================
// CLUSTER B: VALIDATORS
// =============================================================================

/// A validator with its voting power.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Address derived from the public key.
    pub address: Address,
    /// Ed25519 public key.
    pub pub_key: PublicKey,
    /// Voting power, always positive inside a set.
    pub voting_power: i64,
    /// Proposer-selection accumulator.
    pub proposer_priority: i64,
}

impl Validator {
    /// Create a validator with zero priority.
    pub fn new(pub_key: PublicKey, voting_power: i64) -> Self {
        Self {
            address: address_from_pub_key(&pub_key),
            pub_key,
            voting_power,
            proposer_priority: 0,
        }
    }
}

/// An ordered validator set.
///
/// Validators are kept sorted by descending voting power, then by address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidatorSet {
    /// Members of the set.
    pub validators: Vec<Validator>,
    /// Address of the current proposer.
    pub proposer: Option<Address>,
}

impl ValidatorSet {
    /// Build a set and select the first proposer.
    pub fn new(validators: Vec<Validator>) -> Self {
        let mut set = Self {
            validators,
            proposer: None,
        };
        set.sort();
        if !set.is_empty() {
            set.increment_proposer_priority(1);
        }
        set
    }

    /// True if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Sum of all voting power.
    pub fn total_voting_power(&self) -> i64 {
        self.validators.iter().map(|v| v.voting_power).sum()
    }

    /// Look a validator up by address.
    pub fn get_by_address(&self, address: &Address) -> Option<(usize, &Validator)> {
        self.validators
            .iter()
            .enumerate()
            .find(|(_, v)| &v.address == address)
    }

    /// Hash over addresses and voting powers.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        for validator in &self.validators {
            hasher.update(validator.address);
            hasher.update(validator.voting_power.to_be_bytes());
        }
        hasher.finalize().into()
    }

    /// Apply an EndBlock / InitChain change set.
    ///
    /// Power zero removes a validator, any other power inserts or replaces it.
    /// The set is left untouched if any update is invalid.
    pub fn apply_updates(&mut self, updates: &[ValidatorUpdate]) -> Result<(), ValidatorSetError> {
        let mut next = self.validators.clone();

        for update in updates {
            if update.power < 0 {
                return Err(ValidatorSetError::NegativePower {
                    power: update.power,
                });
            }

            let address = address_from_pub_key(&update.pub_key);
            let position = next.iter().position(|v| v.address == address);

            match (position, update.power) {
                (Some(pos), 0) => {
                    next.remove(pos);
                }
                (None, 0) => {
                    return Err(ValidatorSetError::UnknownValidator { address });
                }
                (Some(pos), power) => {
                    next[pos].voting_power = power;
                }
                (None, power) => {
                    next.push(Validator::new(update.pub_key, power));
                }
            }
        }

        if next.is_empty() {
            return Err(ValidatorSetError::EmptyAfterUpdate);
        }

        self.validators = next;
        self.sort();
        Ok(())
    }

    /// Advance proposer selection `times` rounds.
    pub fn increment_proposer_priority(&mut self, times: u32) {
        if self.is_empty() {
            return;
        }
        let total = self.total_voting_power();

        for _ in 0..times {
            for validator in &mut self.validators {
                validator.proposer_priority =
                    validator.proposer_priority.saturating_add(validator.voting_power);
            }

            let mut best = 0;
            for (i, validator) in self.validators.iter().enumerate() {
                let current = &self.validators[best];
                if validator.proposer_priority > current.proposer_priority
                    || (validator.proposer_priority == current.proposer_priority
                        && validator.address < current.address)
                {
                    best = i;
                }
            }

            let proposer = &mut self.validators[best];
            proposer.proposer_priority = proposer.proposer_priority.saturating_sub(total);
            self.proposer = Some(proposer.address);
        }
    }

    fn sort(&mut self) {
        self.validators.sort_by(|a, b| {
            b.voting_power
                .cmp(&a.voting_power)
                .then_with(|| a.address.cmp(&b.address))
        });
    }
}

// =============================================================================
// CLUSTER C: CONSENSUS PARAMETERS
// =============================================================================

/// Largest block size accepted by the params validator (100 MiB).
pub const MAX_BLOCK_SIZE_BYTES: i64 = 104_857_600;

/// Block size and gas limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    pub max_bytes: i64,
    /// `-1` means unlimited.
    pub max_gas: i64,
    pub time_iota_ms: i64,
}

/// Evidence admissibility window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceParams {
    pub max_age_num_blocks: i64,
    pub max_age_duration_secs: i64,
}

/// Accepted validator key types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorParams {
    pub pub_key_types: Vec<String>,
}

/// Consensus parameters carried in chain state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub block: BlockParams,
    pub evidence: EvidenceParams,
    pub validator: ValidatorParams,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            block: BlockParams {
                max_bytes: 22_020_096,
                max_gas: -1,
                time_iota_ms: 1000,
            },
            evidence: EvidenceParams {
                max_age_num_blocks: 100_000,
                max_age_duration_secs: 48 * 60 * 60,
            },
            validator: ValidatorParams {
                pub_key_types: vec!["ed25519".to_string()],
            },
        }
    }
}

impl ConsensusParams {
    /// Check every parameter is inside its admissible range.
    pub fn validate(&self) -> Result<(), ConsensusParamsError> {
        if self.block.max_bytes <= 0 || self.block.max_bytes > MAX_BLOCK_SIZE_BYTES {
            return Err(ConsensusParamsError::BlockMaxBytes(self.block.max_bytes));
        }
        if self.block.max_gas < -1 {
            return Err(ConsensusParamsError::BlockMaxGas(self.block.max_gas));
        }
        if self.block.time_iota_ms <= 0 {
            return Err(ConsensusParamsError::TimeIota(self.block.time_iota_ms));
        }
        if self.evidence.max_age_num_blocks <= 0 || self.evidence.max_age_duration_secs <= 0 {
            return Err(ConsensusParamsError::EvidenceMaxAge);
        }
        if self.validator.pub_key_types.is_empty() {
            return Err(ConsensusParamsError::NoPubKeyTypes);
        }
        Ok(())
    }

    /// Return a copy with the given updates applied. `self` is never mutated.
    pub fn update(&self, updates: &ConsensusParamUpdates) -> Self {
        let mut next = self.clone();
        if let Some(block) = &updates.block {
            next.block = block.clone();
        }
        if let Some(evidence) = &updates.evidence {
            next.evidence = evidence.clone();
        }
        if let Some(validator) = &updates.validator {
            next.validator = validator.clone();
        }
        next
    }
}

// =============================================================================
// CLUSTER D: CHAIN STATE
// =============================================================================

/// Snapshot of everything needed to apply the next block.
///
/// Created once from genesis, then replaced wholesale after every applied
/// block and persisted inside that block's critical zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainState {
    pub chain_id: String,
    /// Height of the last applied block, `0` right after genesis.
    pub last_block_height: u64,
    pub last_block_id: BlockId,
    pub last_block_time: DateTime<Utc>,
    /// Validators for `last_block_height + 2`.
    pub next_validators: ValidatorSet,
    /// Validators for `last_block_height + 1`.
    pub validators: ValidatorSet,
    /// Validators that signed `last_block_height`.
    pub last_validators: ValidatorSet,
    pub last_height_validators_changed: u64,
    pub consensus_params: ConsensusParams,
    pub last_height_consensus_params_changed: u64,
    pub last_results_hash: Vec<u8>,
    /// Application state root expected by the next block.
    pub app_hash: Vec<u8>,
}

impl ChainState {
    /// True for a state that was never initialised from genesis.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
