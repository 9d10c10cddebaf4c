//! # Replica Driver
//!
//! Owns the chain state and the hosted application. Callers serialize access
//! (one block in flight), so every operation takes `&mut self`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rm_01_kv_storage::StorageDriver;
use serde::{Deserialize, Serialize};
use shared_types::{
    Block, BlockState, ChainState, GenesisDoc, RequestInitChain, RequestQuery, ResponseQuery,
    Validator, ValidatorSet, ValidatorUpdate,
};
use tracing::{debug, info, warn};

use crate::collector::EventCollector;
use crate::errors::MantlemintError;
use crate::executor::{BlockExecutor, ExecutorKind};
use crate::ports::app::Application;
use crate::state_store::StateStore;

/// How the replica treats the app hash a block declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPolicy {
    /// Adopt the block's app hash before applying it.
    #[default]
    Trusted,
    /// Reject a block whose app hash differs from the replica's own.
    Verified,
}

impl fmt::Display for ReplayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayPolicy::Trusted => f.write_str("trusted"),
            ReplayPolicy::Verified => f.write_str("verified"),
        }
    }
}

impl FromStr for ReplayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trusted" => Ok(ReplayPolicy::Trusted),
            "verified" => Ok(ReplayPolicy::Verified),
            other => Err(format!("unknown replay policy: {other}")),
        }
    }
}

/// State replica driver.
pub struct Mantlemint {
    app: Box<dyn Application>,
    store: StateStore,
    executor: BlockExecutor,
    replay_policy: ReplayPolicy,
    last_state: ChainState,
    last_height: u64,
    last_block: Option<Block>,
    last_retain_height: u64,
}

impl Mantlemint {
    /// Create a replica over `driver`, resuming from any stored chain state.
    pub fn new(
        app: Box<dyn Application>,
        driver: Arc<StorageDriver>,
        executor: ExecutorKind,
        replay_policy: ReplayPolicy,
    ) -> Result<Self, MantlemintError> {
        let store = StateStore::new(driver);
        let last_state = store.load_state()?.unwrap_or_default();
        let last_height = last_state.last_block_height;

        Ok(Self {
            app,
            store,
            executor: BlockExecutor::new(executor),
            replay_policy,
            last_state,
            last_height,
            last_block: None,
            last_retain_height: 0,
        })
    }

    /// Build the initial chain state from `genesis` unless one is stored.
    pub fn init(&mut self, genesis: &GenesisDoc) -> Result<(), MantlemintError> {
        if let Some(state) = self.store.load_state()? {
            info!(
                height = state.last_block_height,
                chain_id = %state.chain_id,
                "[rm-04] resuming from stored chain state"
            );
            self.last_height = state.last_block_height;
            self.last_state = state;
            return Ok(());
        }

        let mut state = genesis.to_chain_state();
        let response = self.app.init_chain(RequestInitChain {
            time: genesis.genesis_time,
            chain_id: genesis.chain_id.clone(),
            consensus_params: state.consensus_params.clone(),
            validators: state
                .validators
                .validators
                .iter()
                .map(|v| ValidatorUpdate {
                    pub_key: v.pub_key,
                    power: v.voting_power,
                })
                .collect(),
            app_state_bytes: genesis.app_state_bytes(),
        })?;

        if !response.app_hash.is_empty() {
            state.app_hash = response.app_hash;
        }
        if let Some(params) = response.consensus_params {
            params.validate()?;
            state.consensus_params = params;
        }
        if !response.validators.is_empty() {
            let set = validator_set_from_updates(&response.validators);
            let mut next = set.clone();
            next.increment_proposer_priority(1);
            state.validators = set;
            state.next_validators = next;
        }
        if state.validators.is_empty() {
            return Err(MantlemintError::NoGenesisValidators);
        }

        self.store.save_state(&state)?;
        info!(
            chain_id = %state.chain_id,
            validators = state.validators.len(),
            "[rm-04] chain state initialised from genesis"
        );

        self.last_height = state.last_block_height;
        self.last_state = state;
        Ok(())
    }

    /// Apply one block and return what the application produced for it.
    ///
    /// On error the in-memory chain state is left as it was.
    pub fn inject(&mut self, block: &Block) -> Result<BlockState, MantlemintError> {
        if self.last_state.is_empty() {
            return Err(MantlemintError::NotInitialized);
        }

        let mut state = self.last_state.clone();
        match self.replay_policy {
            ReplayPolicy::Trusted => state.app_hash = block.header.app_hash.clone(),
            ReplayPolicy::Verified => {
                if block.header.app_hash != state.app_hash {
                    warn!(
                        height = block.height(),
                        "[rm-04] declared app hash differs from replica"
                    );
                    return Err(MantlemintError::AppHashMismatch {
                        height: block.height(),
                        expected: hex::encode(&state.app_hash),
                        got: hex::encode(&block.header.app_hash),
                    });
                }
            }
        }

        let mut collector = EventCollector::new();
        let applied = self.executor.apply_block(
            self.app.as_mut(),
            &self.store,
            &state,
            block,
            &mut collector,
        )?;

        debug!(
            height = applied.state.last_block_height,
            retain_height = applied.retain_height,
            app_hash = %hex::encode(&applied.state.app_hash),
            "[rm-04] block injected"
        );

        self.last_height = applied.state.last_block_height;
        self.last_state = applied.state;
        self.last_retain_height = applied.retain_height;
        self.last_block = Some(block.clone());

        Ok(collector.into_block_state(block.clone()))
    }

    /// Swap the executor used for subsequent blocks.
    pub fn set_block_executor(&mut self, kind: ExecutorKind) {
        info!(executor = %kind, "[rm-04] block executor changed");
        self.executor = BlockExecutor::new(kind);
    }

    pub fn executor_kind(&self) -> ExecutorKind {
        self.executor.kind()
    }

    pub fn replay_policy(&self) -> ReplayPolicy {
        self.replay_policy
    }

    pub fn current_state(&self) -> &ChainState {
        &self.last_state
    }

    pub fn current_height(&self) -> u64 {
        self.last_height
    }

    /// Last block injected by this process.
    pub fn current_block(&self) -> Option<&Block> {
        self.last_block.as_ref()
    }

    /// Retain-height hint from the last commit.
    pub fn retain_height(&self) -> u64 {
        self.last_retain_height
    }

    pub fn state_store(&self) -> &StateStore {
        &self.store
    }

    /// Query committed application state.
    pub fn query(&self, request: RequestQuery) -> Result<ResponseQuery, MantlemintError> {
        Ok(self.app.query(request)?)
    }
}

fn validator_set_from_updates(updates: &[ValidatorUpdate]) -> ValidatorSet {
    ValidatorSet::new(
        updates
            .iter()
            .filter(|u| u.power > 0)
            .map(|u| Validator::new(u.pub_key, u.power))
            .collect(),
    )
}
