//! # Mantlemint (rm-04)
//!
//! The state replica driver. Owns the replica's chain state and applies each
//! committed block to a hosted [`Application`] through a block executor.
//!
//! ```text
//! inject(block)
//!   ├─ fresh EventCollector
//!   ├─ trusted replay: state.app_hash ← block.app_hash
//!   ├─ BlockExecutor::apply_block
//!   │    ├─ validate (standard only)
//!   │    ├─ BeginBlock → DeliverTx × n → EndBlock   (events → collector)
//!   │    ├─ update_state (validators, params, results hash)
//!   │    ├─ Commit → app hash
//!   │    └─ StateStore: responses + chain state   (lands in the open zone)
//!   └─ BlockState ← collector
//! ```
//!
//! A failed block leaves the in-memory chain state untouched.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod apps;
pub mod collector;
pub mod errors;
pub mod executor;
pub mod mantlemint;
pub mod ports;
pub mod state_store;
pub mod test_utils;

pub use apps::kvstore::KvStoreApp;
pub use collector::{BlockEventPublisher, EventCollector};
pub use errors::{ApplicationError, MantlemintError};
pub use executor::{BlockExecutor, ExecutorKind};
pub use mantlemint::{Mantlemint, ReplayPolicy};
pub use ports::app::Application;
pub use state_store::StateStore;
