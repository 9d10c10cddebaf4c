//! # Block Feed (rm-03)
//!
//! Delivers committed blocks from the upstream ledger node.
//!
//! - [`BlockFeed`] keeps a websocket subscription to `NewBlock` events open
//!   and pushes every decoded block onto one output channel, reconnecting
//!   after a fixed delay when configured to.
//! - [`HttpBlockFetcher`] fetches a single block by height (or the latest)
//!   on demand. Only the catch-up path uses it.
//!
//! Both speak the node's JSON-RPC envelope format, decoded in [`codec`].

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod codec;
pub mod errors;
pub mod fetcher;
pub mod subscription;
pub mod test_utils;

pub use errors::FeedError;
pub use fetcher::{BlockSource, HttpBlockFetcher};
pub use subscription::{BlockFeed, ErrorCallback, FeedConfig};

/// Event filter for new committed blocks.
pub const NEW_BLOCK_QUERY: &str = "tm.event = 'NewBlock'";

/// Delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
