//! Cross-crate flows: feed → orchestrator → replica → indexers → storage.

pub mod catch_up;
pub mod crash_consistency;
pub mod resolver_rounds;
