//! # Rumor Runtime
//!
//! Follows an upstream ledger node and replays its blocks into a local
//! replica, committing every block's storage effects atomically.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration from the environment
//! - `adapters/` - Storage engines behind the `KeyValueStore` port
//! - `indexers/` - Consumers of each round's block and chain state
//! - `mantle` - Crash-consistent injection around the replica
//! - `sync` - Live and catch-up modes over the block feed
//! - `local_client` - In-process queries against the replica application
//! - `shutdown` - Clean and forced shutdown on signals
//!
//! ## Block Flow
//!
//! ```text
//! BlockFeed ──live──→ SyncOrchestrator ──gap──→ BlockSource (HTTP)
//!                            │
//!                            ↓
//!                     Mantle::inject ── critical zone ──────────────┐
//!                            │                                      │
//!                            ├─→ Mantlemint::inject (Application)   │
//!                            ├─→ DepsResolver: ChainState, BlockState
//!                            └─→ Indexers ──────────────────────────┘
//!                                                        release → one synced batch
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod container;
pub mod errors;
pub mod indexers;
pub mod local_client;
pub mod mantle;
#[cfg(unix)]
pub mod shutdown;
pub mod sync;

pub use container::{ConfigError, RuntimeConfig, SyncConfig};
pub use errors::{IndexerError, InjectError, MantleError, SyncError};
pub use indexers::{IndexContext, Indexer, TxIndexer};
pub use local_client::LocalClient;
pub use mantle::Mantle;
pub use sync::{InjectErrorCallback, SyncOrchestrator};
