//! # Runtime Container
//!
//! Process configuration and the wiring that turns it into a running
//! replica.

pub mod config;

pub use config::{ConfigError, GenesisConfig, RuntimeConfig, StorageConfig, SyncConfig};
