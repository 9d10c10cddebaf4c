//! # Key/Value Application
//!
//! A minimal deterministic application.
//!
//! | Transaction | Effect |
//! |-------------|--------|
//! | `key=value` | Stores `value` under `key` |
//! | `key` | Stores `key` under itself |
//! | `val:<hex pub key>!<power>` | Validator update, power `0` removes |
//!
//! Writes are buffered until `commit`, which flushes them through the storage
//! driver. The app hash is the big-endian count of stored keys.

use std::collections::BTreeMap;
use std::sync::Arc;

use rm_01_kv_storage::keys::{document_key, encode_u64};
use rm_01_kv_storage::StorageDriver;
use serde::{Deserialize, Serialize};
use shared_types::{
    Event, PublicKey, RequestBeginBlock, RequestDeliverTx, RequestEndBlock, RequestInitChain,
    RequestQuery, ResponseBeginBlock, ResponseCommit, ResponseDeliverTx, ResponseEndBlock,
    ResponseInitChain, ResponseQuery, ValidatorUpdate,
};
use tracing::debug;

use crate::errors::ApplicationError;
use crate::ports::app::Application;

const DATA_ENTITY: &str = "kvstore";
const META_ENTITY: &str = "kvstore_meta";
const META_ID: &[u8] = b"state";
const VALIDATOR_PREFIX: &[u8] = b"val:";

pub const CODE_OK: u32 = 0;
pub const CODE_EMPTY_TX: u32 = 1;
pub const CODE_BAD_VALIDATOR_TX: u32 = 2;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Meta {
    height: u64,
    size: u64,
}

pub struct KvStoreApp {
    driver: Arc<StorageDriver>,
    meta: Meta,
    pending: BTreeMap<Vec<u8>, Vec<u8>>,
    validator_updates: Vec<ValidatorUpdate>,
}

impl KvStoreApp {
    /// Open the application over `driver`, restoring committed metadata.
    pub fn new(driver: Arc<StorageDriver>) -> Result<Self, ApplicationError> {
        let meta = match driver
            .get(&document_key(META_ENTITY, META_ID))
            .map_err(storage_error)?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| ApplicationError::new(format!("corrupt metadata: {e}")))?,
            None => Meta::default(),
        };

        Ok(Self {
            driver,
            meta,
            pending: BTreeMap::new(),
            validator_updates: Vec::new(),
        })
    }

    pub fn height(&self) -> u64 {
        self.meta.height
    }

    /// Number of committed keys.
    pub fn size(&self) -> u64 {
        self.meta.size
    }

    fn app_hash(&self) -> Vec<u8> {
        encode_u64(self.meta.size).to_vec()
    }

    fn deliver_validator_tx(&mut self, body: &[u8]) -> ResponseDeliverTx {
        match parse_validator_tx(body) {
            Some(update) => {
                let pub_key = hex::encode(update.pub_key);
                let power = update.power.to_string();
                self.validator_updates.push(update);
                ResponseDeliverTx {
                    code: CODE_OK,
                    events: vec![Event::new(
                        "validator",
                        &[("pub_key", pub_key.as_str()), ("power", power.as_str())],
                    )],
                    ..Default::default()
                }
            }
            None => ResponseDeliverTx {
                code: CODE_BAD_VALIDATOR_TX,
                log: "expected val:<hex pub key>!<power>".into(),
                ..Default::default()
            },
        }
    }
}

impl Application for KvStoreApp {
    fn init_chain(
        &mut self,
        request: RequestInitChain,
    ) -> Result<ResponseInitChain, ApplicationError> {
        debug!(
            chain_id = %request.chain_id,
            validators = request.validators.len(),
            "[kvstore] init chain"
        );
        Ok(ResponseInitChain::default())
    }

    fn begin_block(
        &mut self,
        _request: RequestBeginBlock,
    ) -> Result<ResponseBeginBlock, ApplicationError> {
        self.pending.clear();
        self.validator_updates.clear();
        Ok(ResponseBeginBlock::default())
    }

    fn deliver_tx(
        &mut self,
        request: RequestDeliverTx,
    ) -> Result<ResponseDeliverTx, ApplicationError> {
        let tx = request.tx;
        if tx.is_empty() {
            return Ok(ResponseDeliverTx {
                code: CODE_EMPTY_TX,
                log: "empty transaction".into(),
                ..Default::default()
            });
        }
        if let Some(body) = tx.strip_prefix(VALIDATOR_PREFIX) {
            return Ok(self.deliver_validator_tx(body));
        }

        let (key, value) = match tx.iter().position(|b| *b == b'=') {
            Some(split) => (tx[..split].to_vec(), tx[split + 1..].to_vec()),
            None => (tx.clone(), tx.clone()),
        };
        let key_text = String::from_utf8_lossy(&key).into_owned();
        let event = Event::new("app", &[("key", key_text.as_str()), ("creator", "rumor")]);
        self.pending.insert(key, value);

        Ok(ResponseDeliverTx {
            code: CODE_OK,
            events: vec![event],
            ..Default::default()
        })
    }

    fn end_block(&mut self, request: RequestEndBlock) -> Result<ResponseEndBlock, ApplicationError> {
        self.meta.height = request.height;
        Ok(ResponseEndBlock {
            validator_updates: std::mem::take(&mut self.validator_updates),
            ..Default::default()
        })
    }

    fn commit(&mut self) -> Result<ResponseCommit, ApplicationError> {
        for (key, value) in std::mem::take(&mut self.pending) {
            let stored_key = document_key(DATA_ENTITY, &key);
            if self.driver.get(&stored_key).map_err(storage_error)?.is_none() {
                self.meta.size += 1;
            }
            self.driver.set(&stored_key, &value).map_err(storage_error)?;
        }

        let meta = bincode::serialize(&self.meta)
            .map_err(|e| ApplicationError::new(format!("encode metadata: {e}")))?;
        self.driver
            .set(&document_key(META_ENTITY, META_ID), &meta)
            .map_err(storage_error)?;

        Ok(ResponseCommit {
            data: self.app_hash(),
            retain_height: 0,
        })
    }

    fn query(&self, request: RequestQuery) -> Result<ResponseQuery, ApplicationError> {
        let value = self
            .driver
            .get(&document_key(DATA_ENTITY, &request.data))
            .map_err(storage_error)?;

        Ok(match value {
            Some(value) => ResponseQuery {
                code: CODE_OK,
                log: "exists".into(),
                key: request.data,
                value,
                height: self.meta.height,
            },
            None => ResponseQuery {
                code: CODE_OK,
                log: "does not exist".into(),
                key: request.data,
                value: Vec::new(),
                height: self.meta.height,
            },
        })
    }
}

/// Build a `val:<hex pub key>!<power>` transaction.
pub fn validator_tx(pub_key: &PublicKey, power: i64) -> Vec<u8> {
    format!("val:{}!{}", hex::encode(pub_key), power).into_bytes()
}

fn parse_validator_tx(body: &[u8]) -> Option<ValidatorUpdate> {
    let body = std::str::from_utf8(body).ok()?;
    let (key, power) = body.split_once('!')?;
    let pub_key: PublicKey = hex::decode(key).ok()?.try_into().ok()?;
    let power = power.parse::<i64>().ok()?;
    Some(ValidatorUpdate { pub_key, power })
}

fn storage_error(err: rm_01_kv_storage::StorageError) -> ApplicationError {
    ApplicationError::new(format!("storage: {err}"))
}
