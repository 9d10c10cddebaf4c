//! # Shared Types Crate
//!
//! Domain entities shared by the storage, replica, feed and runtime crates.
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `BlockHeader`, `Commit`, `Evidence`
//! - **Chain State**: `ChainState`, `ValidatorSet`, `ConsensusParams`
//! - **Application boundary**: ABCI-style request/response records in [`abci`]
//! - **Derived**: `BlockState`, the per-height execution result
//! - **Input**: `GenesisDoc`

pub mod abci;
pub mod block_state;
pub mod entities;
pub mod errors;
pub mod genesis;

pub use abci::*;
pub use block_state::BlockState;
pub use entities::*;
pub use errors::*;
pub use genesis::{GenesisDoc, GenesisValidator};
