//! # Block Executors
//!
//! Apply one block to chain state and return the next state.
//!
//! | Kind | Validation | Last-commit / evidence info |
//! |------|------------|-----------------------------|
//! | `Standard` | height, chain id, commit link, app hash | rebuilt from stored validator sets |
//! | `Simulation` | none | empty |
//!
//! Simulation runs the same application lifecycle without any input that
//! depends on consensus data, which is what dry-run replays need.

mod execution;
mod validation;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared_types::{Block, ChainState, LastCommitInfo};
use tracing::debug;

use crate::collector::BlockEventPublisher;
use crate::errors::MantlemintError;
use crate::ports::app::Application;
use crate::state_store::StateStore;

pub use execution::{exec_block, last_commit_info, misbehaviors, update_state};
pub use validation::validate_block;

/// Which executor applies blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    #[default]
    Standard,
    Simulation,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Standard => f.write_str("standard"),
            ExecutorKind::Simulation => f.write_str("simulation"),
        }
    }
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(ExecutorKind::Standard),
            "simulation" => Ok(ExecutorKind::Simulation),
            other => Err(format!("unknown executor kind: {other}")),
        }
    }
}

/// Result of applying one block.
#[derive(Debug)]
pub struct AppliedBlock {
    pub state: ChainState,
    /// Lowest height the application still needs, `0` for all.
    pub retain_height: u64,
}

/// Applies blocks according to its [`ExecutorKind`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockExecutor {
    kind: ExecutorKind,
}

impl BlockExecutor {
    pub fn new(kind: ExecutorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ExecutorKind {
        self.kind
    }

    /// Apply `block` on top of `state`.
    ///
    /// The state store receives the block's responses and the next state;
    /// nothing is written if any step fails.
    pub fn apply_block(
        &self,
        app: &mut dyn Application,
        store: &StateStore,
        state: &ChainState,
        block: &Block,
        events: &mut dyn BlockEventPublisher,
    ) -> Result<AppliedBlock, MantlemintError> {
        let height = block.height();

        let (commit_info, byzantine) = match self.kind {
            ExecutorKind::Standard => {
                validate_block(state, block)?;
                (last_commit_info(store, block)?, misbehaviors(store, block)?)
            }
            ExecutorKind::Simulation => (LastCommitInfo::default(), Vec::new()),
        };

        let responses = exec_block(app, block, commit_info, byzantine, events)?;
        let mut next = update_state(state, block, &responses)?;

        let commit = app.commit()?;
        next.app_hash = commit.data;

        store.save_abci_responses(height, &responses)?;
        store.save_state(&next)?;

        debug!(
            height,
            executor = %self.kind,
            txs = responses.deliver_txs.len(),
            "[rm-04] block applied"
        );

        Ok(AppliedBlock {
            state: next,
            retain_height: commit.retain_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_kind_parsing() {
        assert_eq!("standard".parse::<ExecutorKind>(), Ok(ExecutorKind::Standard));
        assert_eq!("Simulation".parse::<ExecutorKind>(), Ok(ExecutorKind::Simulation));
        assert!("fast".parse::<ExecutorKind>().is_err());
        assert_eq!(ExecutorKind::default(), ExecutorKind::Standard);
    }
}
