//! Runtime errors.

use rm_01_kv_storage::{SequenceError, StorageError};
use rm_02_deps_resolver::{EntityKind, ResolverError};
use rm_03_block_feed::FeedError;
use rm_04_mantlemint::MantlemintError;
use thiserror::Error;

/// Outcome of a failed block injection.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The replica refused the block. Nothing from it was kept in memory and
    /// the critical zone was released.
    #[error("block {height} rejected: {source}")]
    Rejected {
        height: u64,
        #[source]
        source: MantlemintError,
    },

    /// The open critical zone was discarded and storage is closed. The
    /// process must stop.
    #[error("fatal failure at block {height}: {reason}")]
    Fatal { height: u64, reason: String },
}

impl InjectError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, InjectError::Fatal { .. })
    }

    pub fn height(&self) -> u64 {
        match self {
            InjectError::Rejected { height, .. } | InjectError::Fatal { height, .. } => *height,
        }
    }
}

/// Errors from the replica wrapper outside block injection.
#[derive(Debug, Error)]
pub enum MantleError {
    #[error("replica initialisation failed: {0}")]
    Init(#[from] MantlemintError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error("no block has been injected yet")]
    NoBlockInjected,
}

/// Errors raised by an indexer while the critical zone is open.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("failed to encode indexed document: {0}")]
    Codec(String),

    #[error("round closed before {0} was emitted")]
    Unresolved(EntityKind),

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl From<bincode::Error> for IndexerError {
    fn from(err: bincode::Error) -> Self {
        IndexerError::Codec(err.to_string())
    }
}

/// Errors that stop the sync orchestrator.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("block feed: {0}")]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Inject(#[from] InjectError),

    #[error("block feed closed")]
    FeedClosed,

    /// The subscription hit a stream error with no handler installed.
    #[error("block feed failed: {0}")]
    FeedFailed(FeedError),
}

impl SyncError {
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Inject(err) => err.is_fatal(),
            SyncError::FeedFailed(_) => true,
            SyncError::Feed(_) | SyncError::FeedClosed => false,
        }
    }
}
