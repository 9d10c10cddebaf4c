//! Replica errors.

use rm_01_kv_storage::StorageError;
use shared_types::{ConsensusParamsError, ValidatorSetError};
use thiserror::Error;

/// Failure reported by the hosted application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("application error: {message}")]
pub struct ApplicationError {
    pub message: String,
}

impl ApplicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MantlemintError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to encode or decode stored state: {0}")]
    Codec(String),

    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error("replica is not initialised")]
    NotInitialized,

    #[error("genesis yields no validators")]
    NoGenesisValidators,

    #[error("wrong chain id: expected {expected}, got {got}")]
    ChainIdMismatch { expected: String, got: String },

    #[error("wrong block height: expected {expected}, got {got}")]
    WrongHeight { expected: u64, got: u64 },

    #[error("last commit of block {height} is for height {got}")]
    LastCommitHeight { height: u64, got: u64 },

    #[error("app hash mismatch at height {height}: expected {expected}, got {got}")]
    AppHashMismatch {
        height: u64,
        expected: String,
        got: String,
    },

    #[error("last commit of block {height} has {got} signatures, validator set has {expected}")]
    CommitSizeMismatch {
        height: u64,
        expected: usize,
        got: usize,
    },

    #[error("no validator set stored for height {height}")]
    MissingValidators { height: u64 },

    #[error("evidence at height {height} names unknown validator {address}")]
    UnknownEvidenceValidator { height: u64, address: String },

    #[error("invalid validator updates: {0}")]
    ValidatorUpdates(#[from] ValidatorSetError),

    #[error("invalid consensus params: {0}")]
    ConsensusParams(#[from] ConsensusParamsError),
}

impl From<bincode::Error> for MantlemintError {
    fn from(err: bincode::Error) -> Self {
        MantlemintError::Codec(err.to_string())
    }
}
