//! # Mantle
//!
//! Wraps the replica with crash-consistent injection and the indexer fan-out.
//!
//! ```text
//! inject(block)
//!   lock ─→ set_critical_zone
//!        ─→ Mantlemint::inject          (panic → purge(true) → Fatal)
//!        ├─ Err → release_critical_zone → Rejected
//!        └─ Ok  → dispose round
//!                 emit ChainState, BlockState
//!                 await indexers          (Err or panic → purge(true) → Fatal)
//!                 release_critical_zone   (Err → purge(true) → Fatal)
//! ```
//!
//! If the `inject` future is dropped while the zone is open, the zone is
//! discarded the same way. After a fatal failure storage is closed and every
//! later call is refused.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use rm_01_kv_storage::StorageDriver;
use rm_02_deps_resolver::{DepsResolver, RoundEntity};
use rm_04_mantlemint::{Application, ExecutorKind, Mantlemint, ReplayPolicy};
use rumor_telemetry::{HistogramTimer, BLOCKS_INJECTED, INJECT_DURATION, INJECT_ERRORS, LOCAL_HEIGHT};
use shared_types::{Block, BlockState, ChainState, GenesisDoc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::errors::{InjectError, MantleError};
use crate::indexers::{IndexContext, Indexer};

/// Crash-consistent replica with registered indexers.
pub struct Mantle {
    mantlemint: Arc<Mutex<Mantlemint>>,
    ctx: IndexContext,
    indexers: Vec<Arc<dyn Indexer>>,
    halted: AtomicBool,
}

impl Mantle {
    /// Build the replica and initialise it from `genesis` inside a critical
    /// zone. A failed initialisation discards the zone and closes storage.
    pub fn new(
        app: Box<dyn Application>,
        storage: Arc<StorageDriver>,
        genesis: &GenesisDoc,
        executor: ExecutorKind,
        replay_policy: ReplayPolicy,
    ) -> Result<Self, MantleError> {
        let mut mantlemint = Mantlemint::new(app, storage.clone(), executor, replay_policy)?;

        storage.set_critical_zone()?;
        if let Err(e) = mantlemint.init(genesis) {
            error!(error = %e, "[mantle] initialisation failed, discarding");
            discard(&storage);
            return Err(e.into());
        }
        if let Err(e) = storage.release_critical_zone() {
            error!(error = %e, "[mantle] failed to commit initial state");
            discard(&storage);
            return Err(e.into());
        }

        let resolver = Arc::new(DepsResolver::new());
        resolver.set_predefined_state(RoundEntity::from(mantlemint.current_state().clone()));

        info!(
            height = mantlemint.current_height(),
            executor = %mantlemint.executor_kind(),
            replay_policy = %mantlemint.replay_policy(),
            "[mantle] replica ready"
        );

        Ok(Self {
            mantlemint: Arc::new(Mutex::new(mantlemint)),
            ctx: IndexContext::new(resolver, storage),
            indexers: Vec::new(),
            halted: AtomicBool::new(false),
        })
    }

    /// Register an indexer. Indexers run in registration order.
    pub fn with_indexer(mut self, indexer: Arc<dyn Indexer>) -> Self {
        info!(indexer = indexer.name(), "[mantle] indexer registered");
        self.indexers.push(indexer);
        self
    }

    /// Apply one block, run the indexers and commit everything atomically.
    pub async fn inject(&self, block: &Block) -> Result<BlockState, InjectError> {
        let height = block.height();
        if self.is_halted() {
            return Err(InjectError::Fatal {
                height,
                reason: "replica halted after a fatal failure".into(),
            });
        }

        let mut mantlemint = self.mantlemint.lock().await;
        let started = Instant::now();
        let _timer = HistogramTimer::new(&INJECT_DURATION);

        if let Err(e) = self.ctx.storage.set_critical_zone() {
            return Err(self.fatal(height, format!("cannot open critical zone: {e}")));
        }
        let zone = ZoneGuard::new(self, height);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| mantlemint.inject(block)));
        let block_state = match outcome {
            Ok(Ok(block_state)) => block_state,
            Ok(Err(source)) => {
                if let Err(e) = self.ctx.storage.release_critical_zone() {
                    return Err(self.fatal(height, format!("cannot release critical zone: {e}")));
                }
                zone.settle();
                INJECT_ERRORS.inc();
                warn!(height, error = %source, "[mantle] block rejected");
                return Err(InjectError::Rejected { height, source });
            }
            Err(payload) => {
                let reason = format!("panic during injection: {}", panic_message(&*payload));
                return Err(self.fatal(height, reason));
            }
        };

        let chain_state = mantlemint.current_state().clone();
        let app_hash = hex::encode(&chain_state.app_hash);
        self.ctx.resolver.dispose();
        let emitted = self
            .ctx
            .resolver
            .emit(chain_state)
            .and_then(|()| self.ctx.resolver.emit(block_state.clone()));
        if let Err(e) = emitted {
            return Err(self.fatal(height, e.to_string()));
        }

        for indexer in &self.indexers {
            let outcome = AssertUnwindSafe(indexer.index(&self.ctx)).catch_unwind().await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(self.fatal(height, format!("indexer {} failed: {e}", indexer.name())));
                }
                Err(payload) => {
                    let reason = format!(
                        "indexer {} panicked: {}",
                        indexer.name(),
                        panic_message(&*payload)
                    );
                    return Err(self.fatal(height, reason));
                }
            }
        }

        if let Err(e) = self.ctx.storage.release_critical_zone() {
            return Err(self.fatal(height, format!("cannot release critical zone: {e}")));
        }
        zone.settle();

        BLOCKS_INJECTED.inc();
        LOCAL_HEIGHT.set(height as f64);
        info!(
            height,
            txs = block.txs.len(),
            app_hash = %app_hash,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[mantle] block committed"
        );
        Ok(block_state)
    }

    /// Discard the open zone, close storage and refuse further blocks.
    fn fatal(&self, height: u64, reason: String) -> InjectError {
        self.halted.store(true, Ordering::SeqCst);
        INJECT_ERRORS.inc();
        error!(height, reason = %reason, "[mantle] fatal injection failure, discarding block");
        discard(&self.ctx.storage);
        InjectError::Fatal { height, reason }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Every entity emitted in the current round, keyed by kind name.
    pub fn export_states(&self) -> HashMap<String, RoundEntity> {
        self.ctx.resolver.get_state()
    }

    /// [`export_states`](Self::export_states) as one JSON object.
    pub fn export_states_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.export_states())
    }

    pub async fn last_state(&self) -> ChainState {
        self.mantlemint.lock().await.current_state().clone()
    }

    pub async fn last_height(&self) -> u64 {
        self.mantlemint.lock().await.current_height()
    }

    /// Last block injected by this process.
    pub async fn last_block(&self) -> Result<Block, MantleError> {
        self.mantlemint
            .lock()
            .await
            .current_block()
            .cloned()
            .ok_or(MantleError::NoBlockInjected)
    }

    pub async fn set_block_executor(&self, kind: ExecutorKind) {
        self.mantlemint.lock().await.set_block_executor(kind);
    }

    pub fn resolver(&self) -> &Arc<DepsResolver> {
        &self.ctx.resolver
    }

    pub fn storage(&self) -> &Arc<StorageDriver> {
        &self.ctx.storage
    }

    /// Handle to the injection lock, shared with the query client and the
    /// signal handlers.
    pub fn replica(&self) -> Arc<Mutex<Mantlemint>> {
        self.mantlemint.clone()
    }

    /// Wait for any block in flight, then close storage.
    ///
    /// A clean shutdown persists indexer state and flushes an open zone; a
    /// forced one discards it.
    pub async fn shutdown(&self, force: bool) -> Result<(), MantleError> {
        let _mantlemint = self.mantlemint.lock().await;
        if self.halted.swap(true, Ordering::SeqCst) {
            info!("[mantle] storage already closed");
            return Ok(());
        }

        if !force {
            for indexer in &self.indexers {
                indexer.release()?;
            }
        }
        self.ctx.storage.purge(force)?;
        info!(force, "[mantle] shut down");
        Ok(())
    }
}

/// Treats an injection that ends with its critical zone still open as fatal.
struct ZoneGuard<'a> {
    mantle: &'a Mantle,
    height: u64,
    open: bool,
}

impl<'a> ZoneGuard<'a> {
    fn new(mantle: &'a Mantle, height: u64) -> Self {
        Self {
            mantle,
            height,
            open: true,
        }
    }

    /// The zone was released.
    fn settle(mut self) {
        self.open = false;
    }
}

impl Drop for ZoneGuard<'_> {
    fn drop(&mut self) {
        if self.open && !self.mantle.is_halted() {
            self.mantle.fatal(
                self.height,
                "injection abandoned with the critical zone open".to_string(),
            );
        }
    }
}

fn discard(storage: &StorageDriver) {
    if let Err(e) = storage.purge(true) {
        error!(error = %e, "[mantle] purge failed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
