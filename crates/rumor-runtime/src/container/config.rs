//! # Runtime Configuration
//!
//! Process-level settings, read from the environment.
//!
//! | Variable | Default | Field |
//! |----------|---------|-------|
//! | `RUMOR_ENDPOINT` | `localhost:26657` | `sync.endpoint` |
//! | `RUMOR_SYNC_UNTIL` | `0` (unbounded) | `sync.sync_until` |
//! | `RUMOR_RECONNECT` | `true` | `sync.reconnect` |
//! | `RUMOR_RECONNECT_DELAY_SECS` | `5` | `sync.reconnect_delay` |
//! | `RUMOR_FETCH_RETRIES` | `0` (unbounded) | `sync.fetch_retries` |
//! | `RUMOR_EXECUTOR` | `standard` | `sync.executor` |
//! | `RUMOR_REPLAY_POLICY` | `trusted` | `sync.replay_policy` |
//! | `RUMOR_DATA_DIR` | `./data` | `storage.data_dir` |
//! | `RUMOR_SYNC_WRITES` | `true` | `storage.sync_writes` |
//! | `RUMOR_GENESIS` | `./genesis.json` | `genesis.genesis_path` |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rm_03_block_feed::DEFAULT_RECONNECT_DELAY_SECS;
use rm_04_mantlemint::{ExecutorKind, ReplayPolicy};
use thiserror::Error;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub genesis: GenesisConfig,
}

impl RuntimeConfig {
    /// Read every setting from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("RUMOR_ENDPOINT") {
            config.sync.endpoint = endpoint;
        }
        if let Some(value) = lookup("RUMOR_SYNC_UNTIL") {
            config.sync.sync_until = parse("RUMOR_SYNC_UNTIL", &value)?;
        }
        if let Some(value) = lookup("RUMOR_RECONNECT") {
            config.sync.reconnect = parse_bool("RUMOR_RECONNECT", &value)?;
        }
        if let Some(value) = lookup("RUMOR_RECONNECT_DELAY_SECS") {
            config.sync.reconnect_delay =
                Duration::from_secs(parse("RUMOR_RECONNECT_DELAY_SECS", &value)?);
        }
        if let Some(value) = lookup("RUMOR_FETCH_RETRIES") {
            config.sync.fetch_retries = parse("RUMOR_FETCH_RETRIES", &value)?;
        }
        if let Some(value) = lookup("RUMOR_EXECUTOR") {
            config.sync.executor = parse("RUMOR_EXECUTOR", &value)?;
        }
        if let Some(value) = lookup("RUMOR_REPLAY_POLICY") {
            config.sync.replay_policy = parse("RUMOR_REPLAY_POLICY", &value)?;
        }
        if let Some(dir) = lookup("RUMOR_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("RUMOR_SYNC_WRITES") {
            config.storage.sync_writes = parse_bool("RUMOR_SYNC_WRITES", &value)?;
        }
        if let Some(path) = lookup("RUMOR_GENESIS") {
            config.genesis.genesis_path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.sync.endpoint.contains("://") {
            return Err(ConfigError::Invalid {
                name: "RUMOR_ENDPOINT",
                value: self.sync.endpoint.clone(),
                reason: "expected host:port without a scheme".into(),
            });
        }
        Ok(())
    }
}

/// Sync orchestrator settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upstream node RPC address as `host:port`.
    pub endpoint: String,
    /// Stop advancing once this height is reached. `0` is unbounded.
    pub sync_until: u64,
    /// Reconnect the feed after errors instead of giving up.
    pub reconnect: bool,
    /// Fixed delay between reconnects and between fetch retries.
    pub reconnect_delay: Duration,
    /// Attempts per catch-up fetch before a transport error surfaces. `0`
    /// retries forever.
    pub fetch_retries: u32,
    pub executor: ExecutorKind,
    pub replay_policy: ReplayPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:26657".to_string(),
            sync_until: 0,
            reconnect: true,
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            fetch_retries: 0,
            executor: ExecutorKind::Standard,
            replay_policy: ReplayPolicy::Trusted,
        }
    }
}

impl SyncConfig {
    /// Short delays for tests.
    pub fn for_testing() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(10),
            fetch_retries: 3,
            ..Default::default()
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Data directory for the key-value engine.
    pub data_dir: PathBuf,
    /// Ask the engine to fsync ordinary writes as well as zone flushes.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            sync_writes: true,
        }
    }
}

/// Genesis configuration.
#[derive(Debug, Clone)]
pub struct GenesisConfig {
    pub genesis_path: PathBuf,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            genesis_path: PathBuf::from("./genesis.json"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("upstream endpoint must not be empty")]
    EmptyEndpoint,

    #[error("invalid {name}={value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<RuntimeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.sync.endpoint, "localhost:26657");
        assert_eq!(config.sync.sync_until, 0);
        assert!(config.sync.reconnect);
        assert_eq!(config.sync.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.sync.executor, ExecutorKind::Standard);
        assert_eq!(config.sync.replay_policy, ReplayPolicy::Trusted);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("RUMOR_ENDPOINT", "node:26657"),
            ("RUMOR_SYNC_UNTIL", "1200"),
            ("RUMOR_RECONNECT", "false"),
            ("RUMOR_EXECUTOR", "simulation"),
            ("RUMOR_REPLAY_POLICY", "verified"),
            ("RUMOR_DATA_DIR", "/var/lib/rumor"),
        ])
        .unwrap();

        assert_eq!(config.sync.endpoint, "node:26657");
        assert_eq!(config.sync.sync_until, 1200);
        assert!(!config.sync.reconnect);
        assert_eq!(config.sync.executor, ExecutorKind::Simulation);
        assert_eq!(config.sync.replay_policy, ReplayPolicy::Verified);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/rumor"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            config_from(&[("RUMOR_SYNC_UNTIL", "soon")]),
            Err(ConfigError::Invalid {
                name: "RUMOR_SYNC_UNTIL",
                ..
            })
        ));
        assert!(matches!(
            config_from(&[("RUMOR_RECONNECT", "maybe")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config_from(&[("RUMOR_EXECUTOR", "fast")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        assert_eq!(
            config_from(&[("RUMOR_ENDPOINT", " ")]).unwrap_err(),
            ConfigError::EmptyEndpoint
        );
    }

    #[test]
    fn test_endpoint_with_scheme_rejected() {
        assert!(config_from(&[("RUMOR_ENDPOINT", "http://node:26657")]).is_err());
    }
}
