//! Error types for the shared data model.

use thiserror::Error;

use crate::entities::Address;

/// Validator set change rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorSetError {
    #[error("validator power must not be negative, got {power}")]
    NegativePower { power: i64 },

    #[error("cannot remove unknown validator {}", hex_address(.address))]
    UnknownValidator { address: Address },

    #[error("applying updates would leave an empty validator set")]
    EmptyAfterUpdate,
}

/// Consensus parameters out of range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusParamsError {
    #[error("block.max_bytes out of range: {0}")]
    BlockMaxBytes(i64),

    #[error("block.max_gas must be >= -1, got {0}")]
    BlockMaxGas(i64),

    #[error("block.time_iota_ms must be positive, got {0}")]
    TimeIota(i64),

    #[error("evidence max age must be positive")]
    EvidenceMaxAge,

    #[error("validator.pub_key_types must not be empty")]
    NoPubKeyTypes,
}

/// Genesis document could not be loaded.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("failed to read genesis file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed genesis document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("genesis chain_id must not be empty")]
    EmptyChainId,

    #[error("genesis validator {name:?} has non-positive power {power}")]
    InvalidValidatorPower { name: String, power: i64 },

    #[error("invalid genesis consensus params: {0}")]
    ConsensusParams(#[from] ConsensusParamsError),
}

fn hex_address(address: &Address) -> String {
    address.iter().map(|b| format!("{b:02x}")).collect()
}
