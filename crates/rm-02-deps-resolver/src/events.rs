//! # Round Entities
//!
//! Everything that can be emitted through the resolver, tagged by kind.

use std::fmt;

use serde::Serialize;
use shared_types::{BlockState, ChainState};

/// Tag identifying one slot in the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Execution result of the block applied in this round.
    BlockState,
    /// Chain state after the block applied in this round.
    ChainState,
    /// Indexer-defined entity, keyed by name.
    Custom(&'static str),
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::BlockState => "BlockState",
            EntityKind::ChainState => "ChainState",
            EntityKind::Custom(name) => *name,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value emitted for one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoundEntity {
    BlockState(Box<BlockState>),
    ChainState(Box<ChainState>),
    Custom {
        #[serde(skip)]
        kind: &'static str,
        value: serde_json::Value,
    },
}

impl RoundEntity {
    /// Wrap an indexer-defined value.
    pub fn custom(kind: &'static str, value: serde_json::Value) -> Self {
        RoundEntity::Custom { kind, value }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            RoundEntity::BlockState(_) => EntityKind::BlockState,
            RoundEntity::ChainState(_) => EntityKind::ChainState,
            RoundEntity::Custom { kind, .. } => EntityKind::Custom(*kind),
        }
    }

    /// Whether this is the empty value of its kind.
    pub fn is_zero(&self) -> bool {
        match self {
            RoundEntity::BlockState(state) => state.height == 0,
            RoundEntity::ChainState(state) => state.is_empty(),
            RoundEntity::Custom { value, .. } => value.is_null(),
        }
    }

    pub fn as_block_state(&self) -> Option<&BlockState> {
        match self {
            RoundEntity::BlockState(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_chain_state(&self) -> Option<&ChainState> {
        match self {
            RoundEntity::ChainState(state) => Some(state),
            _ => None,
        }
    }
}

impl From<BlockState> for RoundEntity {
    fn from(state: BlockState) -> Self {
        RoundEntity::BlockState(Box::new(state))
    }
}

impl From<ChainState> for RoundEntity {
    fn from(state: ChainState) -> Self {
        RoundEntity::ChainState(Box::new(state))
    }
}
