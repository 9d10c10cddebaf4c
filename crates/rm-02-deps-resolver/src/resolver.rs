//! # Resolver
//!
//! Single-lock registry of round values, latest values and pending resolvers.

use std::collections::HashMap;

use parking_lot::Mutex;
use shared_types::{BlockState, ChainState};
use tokio::sync::oneshot;
use tracing::debug;

use crate::errors::ResolverError;
use crate::events::{EntityKind, RoundEntity};

#[derive(Default)]
struct Registry {
    /// Values emitted in the current round.
    published: HashMap<EntityKind, RoundEntity>,
    /// Most recent value of every kind, across rounds.
    latest: HashMap<EntityKind, RoundEntity>,
    /// One delivery slot per blocked resolver.
    waiters: HashMap<EntityKind, Vec<oneshot::Sender<RoundEntity>>>,
    round: u64,
}

/// Per-round publish/resolve registry.
#[derive(Default)]
pub struct DepsResolver {
    registry: Mutex<Registry>,
}

impl DepsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a kind before the first round, e.g. with the genesis chain state.
    pub fn set_predefined_state(&self, value: RoundEntity) {
        let kind = value.kind();
        let mut registry = self.registry.lock();
        registry.published.insert(kind, value.clone());
        registry.latest.insert(kind, value);
    }

    /// Publish `value` for the current round and wake everyone waiting on it.
    pub fn emit(&self, value: impl Into<RoundEntity>) -> Result<(), ResolverError> {
        let value = value.into();
        let kind = value.kind();
        let mut registry = self.registry.lock();

        if registry.published.contains_key(&kind) {
            return Err(ResolverError::AlreadyCommitted { kind });
        }
        registry.published.insert(kind, value.clone());
        registry.latest.insert(kind, value.clone());

        let waiters = registry.waiters.remove(&kind).unwrap_or_default();
        debug!(
            kind = %kind,
            round = registry.round,
            waiters = waiters.len(),
            "[rm-02] entity emitted"
        );
        for waiter in waiters {
            // A dropped receiver just means that resolver gave up.
            let _ = waiter.send(value.clone());
        }
        Ok(())
    }

    /// Wait for the current round's value of `kind`.
    ///
    /// Returns immediately if it was already emitted. Returns `None` if the
    /// round is disposed before anything is emitted.
    pub async fn resolve(&self, kind: EntityKind) -> Option<RoundEntity> {
        let receiver = {
            let mut registry = self.registry.lock();
            if let Some(value) = registry.published.get(&kind) {
                return Some(value.clone());
            }
            let (sender, receiver) = oneshot::channel();
            registry.waiters.entry(kind).or_default().push(sender);
            receiver
        };
        receiver.await.ok()
    }

    /// Most recent value of `kind` regardless of round. Never blocks.
    pub fn resolve_latest(&self, kind: EntityKind) -> Option<RoundEntity> {
        self.registry
            .lock()
            .latest
            .get(&kind)
            .filter(|value| !value.is_zero())
            .cloned()
    }

    /// Typed [`resolve`](Self::resolve) for the block execution result.
    pub async fn resolve_block_state(&self) -> Option<BlockState> {
        match self.resolve(EntityKind::BlockState).await? {
            RoundEntity::BlockState(state) => Some(*state),
            _ => None,
        }
    }

    /// Typed [`resolve`](Self::resolve) for the chain state.
    pub async fn resolve_chain_state(&self) -> Option<ChainState> {
        match self.resolve(EntityKind::ChainState).await? {
            RoundEntity::ChainState(state) => Some(*state),
            _ => None,
        }
    }

    /// End the round.
    ///
    /// Pending resolvers are released with `None`, round values are cleared,
    /// latest values are kept.
    pub fn dispose(&self) {
        let mut registry = self.registry.lock();
        let released: usize = registry.waiters.values().map(Vec::len).sum();
        registry.waiters.clear();
        registry.published.clear();
        registry.round += 1;
        debug!(round = registry.round, released, "[rm-02] round disposed");
    }

    /// Snapshot of every non-zero value emitted this round, keyed by kind name.
    pub fn get_state(&self) -> HashMap<String, RoundEntity> {
        self.registry
            .lock()
            .published
            .iter()
            .filter(|(_, value)| !value.is_zero())
            .map(|(kind, value)| (kind.name().to_string(), value.clone()))
            .collect()
    }

    /// Number of completed rounds.
    pub fn round(&self) -> u64 {
        self.registry.lock().round
    }

    /// Number of resolvers currently waiting on `kind`.
    pub fn waiting(&self, kind: EntityKind) -> usize {
        self.registry.lock().waiters.get(&kind).map_or(0, Vec::len)
    }
}
