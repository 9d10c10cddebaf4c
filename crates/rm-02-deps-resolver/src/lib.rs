//! # Dependency Resolver (rm-02)
//!
//! A per-round broadcast registry for the facts each applied block produces.
//!
//! ```text
//!                 emit(BlockState)            resolve(BlockState)
//! Orchestrator ──────────────────→ Resolver ←──────────────────── Indexer A
//!              emit(ChainState)      │       resolve(ChainState)
//!              ──────────────────→   │   ←──────────────────────── Indexer B
//!                                    └─ dispose() between rounds
//! ```
//!
//! Every entity kind may be emitted at most once per round. A `resolve` that
//! arrives before the emit waits for it; one that arrives after returns the
//! round's value immediately. `dispose` closes the round: waiting resolvers
//! are released empty-handed and the round's values are forgotten, while the
//! latest value of every kind is kept for `resolve_latest`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod errors;
pub mod events;
pub mod resolver;

pub use errors::ResolverError;
pub use events::{EntityKind, RoundEntity};
pub use resolver::DepsResolver;
