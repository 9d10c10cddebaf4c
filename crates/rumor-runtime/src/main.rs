//! # Rumor
//!
//! Follows an upstream ledger node and indexes every committed block.
//!
//! ## Startup Sequence
//!
//! 1. Telemetry and configuration from the environment
//! 2. Genesis document and storage engine
//! 3. Replica initialised (or resumed) inside a critical zone
//! 4. Signal handlers registered
//! 5. Block feed subscribed, sync loop started
//!
//! A fatal failure exits with status 1. A fatal injection failure has
//! already discarded the open zone; an unhandled feed error closes storage
//! cleanly first.

use std::sync::Arc;

use anyhow::{Context, Result};
use rm_03_block_feed::HttpBlockFetcher;
use rm_04_mantlemint::KvStoreApp;
use rumor_runtime::adapters::open_storage;
use rumor_runtime::{Mantle, RuntimeConfig, SyncOrchestrator, TxIndexer};
use rumor_telemetry::{init_telemetry, TelemetryConfig};
use shared_types::GenesisDoc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(&TelemetryConfig::from_env()).context("failed to initialise telemetry")?;
    let config = RuntimeConfig::from_env().context("invalid configuration")?;

    info!("===========================================");
    info!("  Rumor v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        endpoint = %config.sync.endpoint,
        data_dir = %config.storage.data_dir.display(),
        executor = %config.sync.executor,
        replay_policy = %config.sync.replay_policy,
        sync_until = config.sync.sync_until,
        reconnect = config.sync.reconnect,
        "[rumor] starting"
    );

    let genesis = GenesisDoc::load(&config.genesis.genesis_path).with_context(|| {
        format!(
            "failed to load genesis from {}",
            config.genesis.genesis_path.display()
        )
    })?;
    let storage = open_storage(&config.storage).context("failed to open storage")?;

    let app = KvStoreApp::new(storage.clone()).context("failed to open application state")?;
    let tx_indexer = TxIndexer::new(storage.clone()).context("failed to open tx indexer")?;
    let mantle = Arc::new(
        Mantle::new(
            Box::new(app),
            storage,
            &genesis,
            config.sync.executor,
            config.sync.replay_policy,
        )
        .context("failed to initialise replica")?
        .with_indexer(Arc::new(tx_indexer)),
    );

    #[cfg(unix)]
    rumor_runtime::shutdown::spawn_signal_handler(mantle.clone())
        .context("failed to register signal handlers")?;

    let source = Arc::new(
        HttpBlockFetcher::new(&config.sync.endpoint).context("failed to build block fetcher")?,
    );
    let orchestrator = SyncOrchestrator::new(mantle.clone(), source, config.sync.clone());

    match orchestrator.sync().await {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => {
            error!(error = %e, "[rumor] fatal failure, exiting");
            if let Err(close) = mantle.shutdown(false).await {
                error!(error = %close, "[rumor] storage did not close cleanly");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "[rumor] sync stopped");
            mantle
                .shutdown(false)
                .await
                .context("failed to close storage")?;
            Err(e.into())
        }
    }
}
