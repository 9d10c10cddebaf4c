//! # Signal Handling
//!
//! | Signal | Shutdown |
//! |--------|----------|
//! | SIGINT, SIGTERM, SIGQUIT | clean: release indexers, flush, close |
//! | SIGHUP, SIGABRT | forced: discard any open zone, close |
//!
//! Both wait for the block in flight before touching storage, then exit
//! with status 0.

use std::io;
use std::sync::Arc;

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::MantleError;
use crate::mantle::Mantle;

const SIGABRT: i32 = 6;

/// A received shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownRequest {
    pub signal: &'static str,
    pub force: bool,
}

/// Registered shutdown signal streams.
pub struct ShutdownSignals {
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
    hangup: Signal,
    abort: Signal,
}

impl ShutdownSignals {
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
            hangup: signal(SignalKind::hangup())?,
            abort: signal(SignalKind::from_raw(SIGABRT))?,
        })
    }

    /// Wait for the next shutdown signal.
    pub async fn recv(&mut self) -> ShutdownRequest {
        let (signal, force) = tokio::select! {
            _ = self.interrupt.recv() => ("SIGINT", false),
            _ = self.terminate.recv() => ("SIGTERM", false),
            _ = self.quit.recv() => ("SIGQUIT", false),
            _ = self.hangup.recv() => ("SIGHUP", true),
            _ = self.abort.recv() => ("SIGABRT", true),
        };
        ShutdownRequest { signal, force }
    }
}

/// Shut the replica down for `request`.
pub async fn shutdown(mantle: &Mantle, request: ShutdownRequest) -> Result<(), MantleError> {
    if request.force {
        warn!(signal = request.signal, "[shutdown] forced shutdown, discarding open zone");
    } else {
        info!(signal = request.signal, "[shutdown] clean shutdown");
    }
    mantle.shutdown(request.force).await
}

/// Register the signal streams and spawn the task that exits the process on
/// the first one.
pub fn spawn_signal_handler(mantle: Arc<Mantle>) -> io::Result<JoinHandle<()>> {
    let mut signals = ShutdownSignals::register()?;
    Ok(tokio::spawn(async move {
        let request = signals.recv().await;
        if let Err(e) = shutdown(&mantle, request).await {
            error!(error = %e, "[shutdown] storage did not close cleanly");
        }
        std::process::exit(0);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rm_01_kv_storage::keys::decode_u64;
    use rm_01_kv_storage::{InMemoryKVStore, StorageDriver};
    use rm_04_mantlemint::test_utils::TestChain;
    use rm_04_mantlemint::{ExecutorKind, KvStoreApp, ReplayPolicy};

    use crate::indexers::TxIndexer;

    async fn indexed_mantle(store: Arc<InMemoryKVStore>) -> Mantle {
        let storage = Arc::new(StorageDriver::new(store));
        let app = KvStoreApp::new(storage.clone()).unwrap();
        let indexer = TxIndexer::new(storage.clone()).unwrap();
        let mantle = Mantle::new(
            Box::new(app),
            storage,
            &TestChain::genesis(),
            ExecutorKind::Standard,
            ReplayPolicy::Trusted,
        )
        .unwrap()
        .with_indexer(Arc::new(indexer));

        for height in 1..=3 {
            mantle.inject(&TestChain::block(height)).await.unwrap();
        }
        mantle
    }

    fn stored_sequence(store: &InMemoryKVStore) -> Option<u64> {
        let reopened = StorageDriver::new(Arc::new(store.reopen()));
        reopened
            .get(b"seq:tx")
            .unwrap()
            .and_then(|raw| decode_u64(&raw))
    }

    #[tokio::test]
    async fn test_clean_shutdown_releases_indexers() {
        let store = Arc::new(InMemoryKVStore::new());
        let mantle = indexed_mantle(store.clone()).await;

        let request = ShutdownRequest {
            signal: "SIGTERM",
            force: false,
        };
        shutdown(&mantle, request).await.unwrap();

        assert!(store.is_closed());
        assert_eq!(stored_sequence(&store), Some(3));
    }

    #[tokio::test]
    async fn test_forced_shutdown_keeps_lease() {
        let store = Arc::new(InMemoryKVStore::new());
        let mantle = indexed_mantle(store.clone()).await;

        let request = ShutdownRequest {
            signal: "SIGHUP",
            force: true,
        };
        shutdown(&mantle, request).await.unwrap();

        assert!(store.is_closed());
        assert_eq!(
            stored_sequence(&store),
            Some(crate::indexers::tx_indexer::DEFAULT_BANDWIDTH)
        );
    }

    #[tokio::test]
    async fn test_injection_refused_after_shutdown() {
        let store = Arc::new(InMemoryKVStore::new());
        let mantle = indexed_mantle(store).await;
        mantle.shutdown(false).await.unwrap();

        assert!(mantle.inject(&TestChain::block(4)).await.unwrap_err().is_fatal());
    }
}
