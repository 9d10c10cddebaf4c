//! # Block Fetcher
//!
//! On-demand `GET /block` access used to close height gaps.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared_types::Block;
use tracing::debug;

use crate::codec::decode_block_response;
use crate::errors::FeedError;

/// Source of individual blocks by height.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch the block at `height`, or the latest block when `None`.
    async fn fetch_block(&self, height: Option<u64>) -> Result<Block, FeedError>;

    /// Height of the node's latest block.
    async fn latest_height(&self) -> Result<u64, FeedError> {
        Ok(self.fetch_block(None).await?.height())
    }
}

/// HTTP implementation against the node's RPC port.
pub struct HttpBlockFetcher {
    client: Client,
    base_url: String,
}

impl HttpBlockFetcher {
    /// Fetcher for a node RPC endpoint given as `host:port`.
    pub fn new(endpoint: &str) -> Result<Self, FeedError> {
        Self::with_base_url(format!("http://{endpoint}"))
    }

    /// Fetcher for a full base URL such as `http://127.0.0.1:26657`.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(3))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn block_url(&self, height: Option<u64>) -> String {
        match height {
            Some(height) => format!("{}/block?height={height}", self.base_url),
            None => format!("{}/block", self.base_url),
        }
    }
}

#[async_trait]
impl BlockSource for HttpBlockFetcher {
    async fn fetch_block(&self, height: Option<u64>) -> Result<Block, FeedError> {
        let url = self.block_url(height);
        debug!(%url, "[rm-03] fetching block");

        let body = self.client.get(&url).send().await?.text().await?;
        decode_block_response(&body)
    }
}
