//! # Sync Orchestrator
//!
//! Drives the replica forward from the block feed.
//!
//! ## Modes
//!
//! - **Live**: the next feed block is `local + 1`, inject it.
//! - **Catch-up**: the feed jumped ahead. Ask the node for its latest height,
//!   then fetch `local + 1 ..= tip` one by one over HTTP. The live block that
//!   triggered it is injected only if it is still next.
//!
//! Blocks at or below the local height are stale and skipped. Transport
//! failures while fetching are retried after `reconnect_delay`, forever unless
//! `fetch_retries` caps them. Once `sync_until` is reached nothing more is
//! injected and the loop parks.

use std::future::Future;
use std::sync::Arc;

use rm_03_block_feed::{BlockFeed, BlockSource, FeedConfig, FeedError};
use rumor_telemetry::{metric_inc, CATCHUP_BLOCKS, FEED_RECONNECTS};
use shared_types::Block;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::container::SyncConfig;
use crate::errors::{InjectError, SyncError};
use crate::mantle::Mantle;

/// Called with every rejected block. Without one a rejection stops the sync.
pub type InjectErrorCallback = Arc<dyn Fn(&InjectError) + Send + Sync>;

pub struct SyncOrchestrator {
    mantle: Arc<Mantle>,
    source: Arc<dyn BlockSource>,
    config: SyncConfig,
    on_inject_error: Option<InjectErrorCallback>,
}

impl SyncOrchestrator {
    pub fn new(mantle: Arc<Mantle>, source: Arc<dyn BlockSource>, config: SyncConfig) -> Self {
        Self {
            mantle,
            source,
            config,
            on_inject_error: None,
        }
    }

    pub fn with_inject_error_callback(mut self, callback: InjectErrorCallback) -> Self {
        self.on_inject_error = Some(callback);
        self
    }

    /// Subscribe to the node's block feed and follow it.
    ///
    /// Returns only on a fatal failure, a rejected block with no callback,
    /// or when the feed gives up.
    pub async fn sync(&self) -> Result<(), SyncError> {
        let feed_config = FeedConfig {
            reconnect_delay: self.config.reconnect_delay,
            ..FeedConfig::for_endpoint(&self.config.endpoint, self.config.reconnect)
        };
        let feed = BlockFeed::new(feed_config).with_error_callback(Arc::new(|err: &FeedError| {
            metric_inc!(FEED_RECONNECTS);
            warn!(error = %err, "[sync] block feed error");
        }));

        let (blocks, feed) = feed.subscribe().await?;
        info!(
            endpoint = %self.config.endpoint,
            local_height = self.mantle.last_height().await,
            sync_until = self.config.sync_until,
            "[sync] following block feed"
        );
        let result = self.run(blocks).await;
        finish(result, feed).await
    }

    /// Consume live blocks until the channel closes.
    pub async fn run(&self, mut blocks: mpsc::Receiver<Block>) -> Result<(), SyncError> {
        while let Some(block) = blocks.recv().await {
            self.handle_live_block(block).await?;
        }
        warn!("[sync] block feed closed");
        Err(SyncError::FeedClosed)
    }

    async fn handle_live_block(&self, block: Block) -> Result<(), SyncError> {
        let height = block.height();
        let local = self.mantle.last_height().await;

        if height <= local {
            debug!(height, local, "[sync] stale block skipped");
            return Ok(());
        }

        if height > local + 1 {
            let tip = self
                .with_retry(None, || self.source.latest_height())
                .await?;
            info!(local, live = height, tip, "[sync] behind the feed, catching up");
            self.catch_up(tip).await?;

            let local = self.mantle.last_height().await;
            if height <= local {
                debug!(height, local, "[sync] live block applied during catch-up");
                return Ok(());
            }
            if height != local + 1 {
                warn!(height, local, "[sync] gap still open, waiting for the next block");
                return Ok(());
            }
        }

        self.inject(&block).await?;
        Ok(())
    }

    /// Fetch and inject blocks until the local height reaches `target`.
    async fn catch_up(&self, target: u64) -> Result<(), SyncError> {
        let mut local = self.mantle.last_height().await;
        while local < target {
            let next = local + 1;
            let block = self
                .with_retry(Some(next), || self.source.fetch_block(Some(next)))
                .await?;
            if !self.inject(&block).await? {
                return Ok(());
            }
            metric_inc!(CATCHUP_BLOCKS);
            local = self.mantle.last_height().await;
        }
        info!(height = local, "[sync] caught up");
        Ok(())
    }

    /// Run `request` until it succeeds, a non-transient error comes back, or
    /// `fetch_retries` attempts (when non-zero) are used up.
    async fn with_retry<T, F, Fut>(&self, height: Option<u64>, request: F) -> Result<T, SyncError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let limit = self.config.fetch_retries;
        let mut attempt = 1;
        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && (limit == 0 || attempt < limit) => {
                    warn!(
                        height = ?height,
                        attempt,
                        error = %err,
                        "[sync] block fetch failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Inject one block. `Ok(false)` means it was rejected and reported to
    /// the callback.
    async fn inject(&self, block: &Block) -> Result<bool, SyncError> {
        self.halt_if_reached().await;

        match self.mantle.inject(block).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => match &self.on_inject_error {
                Some(callback) => {
                    callback(&err);
                    Ok(false)
                }
                None => Err(err.into()),
            },
        }
    }

    /// Park forever once `sync_until` is reached.
    async fn halt_if_reached(&self) {
        let local = self.mantle.last_height().await;
        if self.config.sync_until != 0 && local >= self.config.sync_until {
            info!(
                height = local,
                sync_until = self.config.sync_until,
                "[sync] target height reached, halting"
            );
            std::future::pending::<()>().await;
        }
    }
}

/// Fold the feed task's outcome into the sync result. A closed channel whose
/// task stopped on an unhandled error is fatal.
async fn finish(
    result: Result<(), SyncError>,
    feed: JoinHandle<Result<(), FeedError>>,
) -> Result<(), SyncError> {
    match result {
        Err(SyncError::FeedClosed) => match feed.await {
            Ok(Err(err)) => Err(SyncError::FeedFailed(err)),
            _ => Err(SyncError::FeedClosed),
        },
        other => {
            feed.abort();
            other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use rm_01_kv_storage::{InMemoryKVStore, StorageDriver};
    use rm_03_block_feed::test_utils::MockBlockSource;
    use rm_04_mantlemint::test_utils::{FaultyApp, TestChain};
    use rm_04_mantlemint::{Application, ExecutorKind, KvStoreApp, ReplayPolicy};
    use tokio::time::timeout;

    fn mantle(app: impl FnOnce(Arc<StorageDriver>) -> Box<dyn Application>) -> Arc<Mantle> {
        let storage = Arc::new(StorageDriver::new(Arc::new(InMemoryKVStore::new())));
        let app = app(storage.clone());
        Arc::new(
            Mantle::new(
                app,
                storage,
                &TestChain::genesis(),
                ExecutorKind::Standard,
                ReplayPolicy::Trusted,
            )
            .unwrap(),
        )
    }

    fn kvstore_mantle() -> Arc<Mantle> {
        mantle(|storage| Box::new(KvStoreApp::new(storage).unwrap()))
    }

    fn source(heights: std::ops::RangeInclusive<u64>) -> Arc<MockBlockSource> {
        Arc::new(MockBlockSource::new(heights.map(TestChain::block)))
    }

    fn feed(heights: &[u64]) -> mpsc::Receiver<Block> {
        let (sender, receiver) = mpsc::channel(heights.len().max(1));
        for height in heights {
            sender.try_send(TestChain::block(*height)).unwrap();
        }
        receiver
    }

    #[tokio::test]
    async fn test_live_blocks_injected_in_order() {
        let mantle = kvstore_mantle();
        let source = source(1..=3);
        let sync = SyncOrchestrator::new(mantle.clone(), source.clone(), SyncConfig::for_testing());

        let result = sync.run(feed(&[1, 2, 3])).await;

        assert!(matches!(result, Err(SyncError::FeedClosed)));
        assert_eq!(mantle.last_height().await, 3);
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_gap_triggers_catch_up() {
        let mantle = kvstore_mantle();
        let source = source(1..=6);
        let sync = SyncOrchestrator::new(mantle.clone(), source.clone(), SyncConfig::for_testing());

        let _ = sync.run(feed(&[1, 2, 3, 6])).await;

        assert_eq!(mantle.last_height().await, 6);
        assert_eq!(source.requests(), vec![None, Some(4), Some(5), Some(6)]);
    }

    #[tokio::test]
    async fn test_catch_up_reaches_remote_tip() {
        let mantle = kvstore_mantle();
        let source = source(1..=5);
        let sync = SyncOrchestrator::new(mantle.clone(), source.clone(), SyncConfig::for_testing());

        let _ = sync.run(feed(&[3])).await;

        assert_eq!(mantle.last_height().await, 5);
        assert_eq!(
            source.requests(),
            vec![None, Some(1), Some(2), Some(3), Some(4), Some(5)]
        );
    }

    #[tokio::test]
    async fn test_stale_blocks_skipped() {
        let mantle = kvstore_mantle();
        let sync = SyncOrchestrator::new(mantle.clone(), source(1..=2), SyncConfig::for_testing());

        let _ = sync.run(feed(&[1, 2, 1, 2])).await;
        assert_eq!(mantle.last_height().await, 2);
    }

    #[tokio::test]
    async fn test_transient_fetch_errors_retried() {
        let mantle = kvstore_mantle();
        let source = source(1..=3);
        source.fail_next(2);
        let sync = SyncOrchestrator::new(mantle.clone(), source.clone(), SyncConfig::for_testing());

        let _ = sync.run(feed(&[3])).await;

        assert_eq!(mantle.last_height().await, 3);
        assert_eq!(
            source.requests(),
            vec![None, None, None, Some(1), Some(2), Some(3)]
        );
    }

    #[tokio::test]
    async fn test_unbounded_retries_outlast_failures() {
        let mantle = kvstore_mantle();
        let source = source(1..=2);
        source.fail_next(8);
        let config = SyncConfig {
            fetch_retries: 0,
            ..SyncConfig::for_testing()
        };
        let sync = SyncOrchestrator::new(mantle.clone(), source.clone(), config);

        let result = sync.run(feed(&[2])).await;

        assert!(matches!(result, Err(SyncError::FeedClosed)));
        assert_eq!(mantle.last_height().await, 2);
        assert_eq!(source.requests().len(), 8 + 3);
    }

    #[tokio::test]
    async fn test_capped_retries_give_up() {
        let mantle = kvstore_mantle();
        let source = source(1..=3);
        source.fail_next(10);
        let sync = SyncOrchestrator::new(mantle.clone(), source, SyncConfig::for_testing());

        let result = sync.run(feed(&[3])).await;

        assert!(matches!(result, Err(SyncError::Feed(_))));
        assert_eq!(mantle.last_height().await, 0);
    }

    #[tokio::test]
    async fn test_rejection_without_callback_stops_sync() {
        let mantle = mantle(|storage| Box::new(FaultyApp::failing_at(storage, 2)));
        let sync = SyncOrchestrator::new(mantle.clone(), source(1..=3), SyncConfig::for_testing());

        let result = sync.run(feed(&[1, 2, 3])).await;

        assert!(matches!(result, Err(SyncError::Inject(InjectError::Rejected { height: 2, .. }))));
        assert!(!result.unwrap_err().is_fatal());
        assert_eq!(mantle.last_height().await, 1);
    }

    #[tokio::test]
    async fn test_rejection_reported_to_callback() {
        let mantle = mantle(|storage| Box::new(FaultyApp::failing_at(storage, 2)));
        let rejected = Arc::new(AtomicUsize::new(0));
        let counter = rejected.clone();
        let sync = SyncOrchestrator::new(mantle.clone(), source(1..=3), SyncConfig::for_testing())
            .with_inject_error_callback(Arc::new(move |_: &InjectError| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        let result = sync.run(feed(&[1, 2])).await;

        assert!(matches!(result, Err(SyncError::FeedClosed)));
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
        assert_eq!(mantle.last_height().await, 1);
    }

    #[tokio::test]
    async fn test_panic_is_fatal_even_with_callback() {
        let mantle = mantle(|storage| Box::new(FaultyApp::panicking_at(storage, 2)));
        let sync = SyncOrchestrator::new(mantle.clone(), source(1..=3), SyncConfig::for_testing())
            .with_inject_error_callback(Arc::new(|_: &InjectError| {}));

        let result = sync.run(feed(&[1, 2, 3])).await;

        assert!(result.unwrap_err().is_fatal());
        assert!(mantle.is_halted());
    }

    #[tokio::test]
    async fn test_unhandled_feed_error_is_fatal() {
        let feed = tokio::spawn(async { Err::<(), _>(FeedError::Closed) });
        let result = finish(Err(SyncError::FeedClosed), feed).await;

        let err = result.unwrap_err();
        assert!(matches!(err, SyncError::FeedFailed(FeedError::Closed)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_clean_feed_stop_is_not_fatal() {
        let feed = tokio::spawn(async { Ok::<(), FeedError>(()) });
        let err = finish(Err(SyncError::FeedClosed), feed).await.unwrap_err();

        assert!(matches!(err, SyncError::FeedClosed));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_sync_until_parks() {
        let mantle = kvstore_mantle();
        let config = SyncConfig {
            sync_until: 2,
            ..SyncConfig::for_testing()
        };
        let sync = SyncOrchestrator::new(mantle.clone(), source(1..=5), config);

        let parked = timeout(Duration::from_millis(100), sync.run(feed(&[1, 2, 3, 4]))).await;

        assert!(parked.is_err());
        assert_eq!(mantle.last_height().await, 2);
    }
}
