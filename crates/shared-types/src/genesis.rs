//! # Genesis Document
//!
//! JSON description of the chain's initial state, read once at startup.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, DisplayFromStr, PickFirst};

use crate::entities::{ChainState, ConsensusParams, PublicKey, Validator, ValidatorSet};
use crate::errors::GenesisError;

/// A validator listed in the genesis document.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Hex-encoded Ed25519 public key.
    #[serde_as(as = "Hex")]
    pub pub_key: PublicKey,
    /// Accepts both `10` and `"10"`.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub power: i64,
    #[serde(default)]
    pub name: String,
}

/// Genesis document.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub genesis_time: DateTime<Utc>,
    pub chain_id: String,
    #[serde(default)]
    pub consensus_params: Option<ConsensusParams>,
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
    #[serde_as(as = "Hex")]
    #[serde(default)]
    pub app_hash: Vec<u8>,
    #[serde(default)]
    pub app_state: serde_json::Value,
}

impl GenesisDoc {
    /// Parse and validate a genesis document.
    pub fn from_json(json: &str) -> Result<Self, GenesisError> {
        let doc: GenesisDoc = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Read, parse and validate a genesis file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GenesisError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Structural checks.
    pub fn validate(&self) -> Result<(), GenesisError> {
        if self.chain_id.is_empty() {
            return Err(GenesisError::EmptyChainId);
        }
        for validator in &self.validators {
            if validator.power <= 0 {
                return Err(GenesisError::InvalidValidatorPower {
                    name: validator.name.clone(),
                    power: validator.power,
                });
            }
        }
        if let Some(params) = &self.consensus_params {
            params.validate()?;
        }
        Ok(())
    }

    /// Consensus parameters, falling back to defaults.
    pub fn consensus_params(&self) -> ConsensusParams {
        self.consensus_params.clone().unwrap_or_default()
    }

    /// Serialized application state handed to InitChain.
    pub fn app_state_bytes(&self) -> Vec<u8> {
        if self.app_state.is_null() {
            Vec::new()
        } else {
            self.app_state.to_string().into_bytes()
        }
    }

    /// Chain state before the first block.
    ///
    /// The validator sets stay empty when genesis lists no validators; the
    /// application is then expected to provide them from InitChain.
    pub fn to_chain_state(&self) -> ChainState {
        let validators: Vec<Validator> = self
            .validators
            .iter()
            .map(|v| Validator::new(v.pub_key, v.power))
            .collect();

        let (validator_set, next_validator_set) = if validators.is_empty() {
            (ValidatorSet::default(), ValidatorSet::default())
        } else {
            let set = ValidatorSet::new(validators);
            let mut next = set.clone();
            next.increment_proposer_priority(1);
            (set, next)
        };

        ChainState {
            chain_id: self.chain_id.clone(),
            last_block_height: 0,
            last_block_id: Default::default(),
            last_block_time: self.genesis_time,
            next_validators: next_validator_set,
            validators: validator_set,
            last_validators: ValidatorSet::default(),
            last_height_validators_changed: 1,
            consensus_params: self.consensus_params(),
            last_height_consensus_params_changed: 1,
            last_results_hash: Vec::new(),
            app_hash: self.app_hash.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: &str = r#"{
        "genesis_time": "2024-01-01T00:00:00Z",
        "chain_id": "rumor-test",
        "validators": [
            { "pub_key": "0101010101010101010101010101010101010101010101010101010101010101", "power": "10", "name": "alpha" },
            { "pub_key": "0202020202020202020202020202020202020202020202020202020202020202", "power": 5 }
        ],
        "app_hash": "",
        "app_state": { "accounts": [] }
    }"#;

    #[test]
    fn test_parse_genesis() {
        let doc = GenesisDoc::from_json(GENESIS).unwrap();
        assert_eq!(doc.chain_id, "rumor-test");
        assert_eq!(doc.validators.len(), 2);
        assert_eq!(doc.validators[0].power, 10);
        assert_eq!(doc.validators[1].power, 5);
        assert_eq!(doc.validators[0].pub_key, [1u8; 32]);
        assert!(doc.app_hash.is_empty());
    }

    #[test]
    fn test_genesis_state() {
        let doc = GenesisDoc::from_json(GENESIS).unwrap();
        let state = doc.to_chain_state();

        assert_eq!(state.last_block_height, 0);
        assert_eq!(state.validators.len(), 2);
        assert_eq!(state.next_validators.len(), 2);
        assert!(state.last_validators.is_empty());
        assert_eq!(state.consensus_params, ConsensusParams::default());
        assert!(!state.is_empty());
    }

    #[test]
    fn test_empty_chain_id_rejected() {
        let json = GENESIS.replace("rumor-test", "");
        assert!(matches!(
            GenesisDoc::from_json(&json),
            Err(GenesisError::EmptyChainId)
        ));
    }

    #[test]
    fn test_zero_power_rejected() {
        let json = GENESIS.replace("\"power\": 5", "\"power\": 0");
        assert!(matches!(
            GenesisDoc::from_json(&json),
            Err(GenesisError::InvalidValidatorPower { power: 0, .. })
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            GenesisDoc::from_json("{ not json"),
            Err(GenesisError::Parse(_))
        ));
    }
}
