//! # Chain State Store
//!
//! Persists chain state, per-height validator sets and per-height responses
//! through the storage driver, bincode-encoded.
//!
//! | Document | Key |
//! |----------|-----|
//! | latest chain state | `state 0x01 latest` |
//! | validators for height h | `validators 0x01 be(h)` |
//! | responses for height h | `abci_responses 0x01 be(h)` |
//!
//! Writes made while a critical zone is open land with that zone. Reads only
//! see released data.

use std::sync::Arc;

use rm_01_kv_storage::keys::{document_key, encode_u64};
use rm_01_kv_storage::StorageDriver;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{AbciResponses, ChainState, ValidatorSet};

use crate::errors::MantlemintError;

const STATE_ENTITY: &str = "state";
const VALIDATORS_ENTITY: &str = "validators";
const ABCI_RESPONSES_ENTITY: &str = "abci_responses";
const LATEST_ID: &[u8] = b"latest";

pub struct StateStore {
    driver: Arc<StorageDriver>,
}

impl StateStore {
    pub fn new(driver: Arc<StorageDriver>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &Arc<StorageDriver> {
        &self.driver
    }

    /// Latest chain state, `None` before genesis.
    pub fn load_state(&self) -> Result<Option<ChainState>, MantlemintError> {
        self.read(&document_key(STATE_ENTITY, LATEST_ID))
    }

    /// Persist `state` and the validator sets it fixes.
    ///
    /// `validators` sign height `last_block_height + 1` and `next_validators`
    /// height `last_block_height + 2`.
    pub fn save_state(&self, state: &ChainState) -> Result<(), MantlemintError> {
        let next_height = state.last_block_height + 1;
        if state.last_block_height == 0 {
            self.save_validators(next_height, &state.validators)?;
        }
        self.save_validators(next_height + 1, &state.next_validators)?;
        self.write(&document_key(STATE_ENTITY, LATEST_ID), state)
    }

    pub fn save_validators(&self, height: u64, set: &ValidatorSet) -> Result<(), MantlemintError> {
        self.write(&validators_key(height), set)
    }

    pub fn load_validators(&self, height: u64) -> Result<Option<ValidatorSet>, MantlemintError> {
        self.read(&validators_key(height))
    }

    pub fn save_abci_responses(
        &self,
        height: u64,
        responses: &AbciResponses,
    ) -> Result<(), MantlemintError> {
        self.write(&document_key(ABCI_RESPONSES_ENTITY, &encode_u64(height)), responses)
    }

    pub fn load_abci_responses(
        &self,
        height: u64,
    ) -> Result<Option<AbciResponses>, MantlemintError> {
        self.read(&document_key(ABCI_RESPONSES_ENTITY, &encode_u64(height)))
    }

    fn write<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), MantlemintError> {
        let bytes = bincode::serialize(value)?;
        self.driver.set(key, &bytes)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, MantlemintError> {
        match self.driver.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn validators_key(height: u64) -> Vec<u8> {
    document_key(VALIDATORS_ENTITY, &encode_u64(height))
}
