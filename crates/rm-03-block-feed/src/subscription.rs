//! # New-Block Subscription
//!
//! Long-lived websocket subscription to the node's `NewBlock` events.
//!
//! ## Error Handling
//!
//! | Situation | Behaviour |
//! |-----------|-----------|
//! | First connect fails, `reconnect` | Retry every `reconnect_delay`, forever |
//! | First connect fails, no `reconnect` | `FeedError::Connect` from [`BlockFeed::subscribe`] |
//! | Stream error, error callback set | Callback, then reconnect if enabled, else stop |
//! | Stream error, no callback | Fatal: the channel closes and the task returns the error |
//!
//! Every (re)connection resubscribes and discards the node's first reply,
//! which is the subscription acknowledgement. Blocks from every connection go
//! to the same output channel.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use shared_types::Block;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::codec::{decode_event, subscribe_request, FeedMessage};
use crate::errors::FeedError;
use crate::DEFAULT_RECONNECT_DELAY_SECS;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Invoked with every stream error when set.
pub type ErrorCallback = Arc<dyn Fn(&FeedError) + Send + Sync>;

/// Subscription settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Websocket URL, e.g. `ws://localhost:26657/websocket`.
    pub url: String,
    pub reconnect: bool,
    pub reconnect_delay: Duration,
    /// Output channel capacity.
    pub capacity: usize,
}

impl FeedConfig {
    /// Settings for a node RPC endpoint given as `host:port`.
    pub fn for_endpoint(endpoint: &str, reconnect: bool) -> Self {
        Self {
            url: format!("ws://{endpoint}/websocket"),
            reconnect,
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            capacity: 64,
        }
    }
}

/// Websocket block feed.
pub struct BlockFeed {
    config: FeedConfig,
    on_error: Option<ErrorCallback>,
}

impl BlockFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            on_error: None,
        }
    }

    /// Install an error callback, making stream errors non-fatal.
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// Connect, subscribe and start delivering blocks.
    ///
    /// The returned channel closes when the feed gives up. The task then
    /// resolves to the error that stopped it, or `Ok` for a clean stop.
    pub async fn subscribe(
        self,
    ) -> Result<(mpsc::Receiver<Block>, JoinHandle<Result<(), FeedError>>), FeedError> {
        let stream = self.connect().await?;
        let (sender, receiver) = mpsc::channel(self.config.capacity);
        let handle = tokio::spawn(self.run(stream, sender));
        Ok((receiver, handle))
    }

    async fn connect(&self) -> Result<WsStream, FeedError> {
        loop {
            match open_subscription(&self.config.url).await {
                Ok(stream) => {
                    info!(url = %self.config.url, "[rm-03] subscribed to new blocks");
                    return Ok(stream);
                }
                Err(err) if self.config.reconnect => {
                    warn!(
                        url = %self.config.url,
                        error = %err,
                        retry_in_secs = self.config.reconnect_delay.as_secs_f64(),
                        "[rm-03] connection failed, retrying"
                    );
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run(self, mut stream: WsStream, sender: mpsc::Sender<Block>) -> Result<(), FeedError> {
        loop {
            let err = match pump(&mut stream, &sender).await {
                Ok(()) => {
                    debug!("[rm-03] output channel dropped, stopping feed");
                    let _ = stream.close(None).await;
                    return Ok(());
                }
                Err(err) => err,
            };
            let _ = stream.close(None).await;

            match &self.on_error {
                Some(callback) => callback(&err),
                None => {
                    error!(error = %err, "[rm-03] feed failed with no error handler");
                    return Err(err);
                }
            }

            if !self.config.reconnect {
                warn!(error = %err, "[rm-03] feed stopped");
                return Ok(());
            }

            tokio::time::sleep(self.config.reconnect_delay).await;
            stream = match self.connect().await {
                Ok(stream) => stream,
                Err(err) => {
                    error!(error = %err, "[rm-03] reconnect failed");
                    return Err(err);
                }
            };
        }
    }
}

async fn open_subscription(url: &str) -> Result<WsStream, FeedError> {
    let (mut stream, _) = connect_async(url).await.map_err(|e| FeedError::Connect {
        endpoint: url.to_string(),
        message: e.to_string(),
    })?;
    stream
        .send(Message::Text(subscribe_request().into()))
        .await
        .map_err(|e| FeedError::Transport(e.to_string()))?;
    Ok(stream)
}

/// Forward blocks until the stream fails or the receiver goes away.
///
/// `Ok(())` means the receiver was dropped.
async fn pump(stream: &mut WsStream, sender: &mpsc::Sender<Block>) -> Result<(), FeedError> {
    let mut acknowledged = false;

    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| FeedError::Transport(e.to_string()))?;
        match frame {
            Message::Text(text) => {
                let message = decode_event(&text)?;
                if !acknowledged {
                    acknowledged = true;
                    continue;
                }
                if let FeedMessage::Block(block) = message {
                    debug!(height = block.height(), "[rm-03] block received");
                    if sender.send(*block).await.is_err() {
                        return Ok(());
                    }
                }
            }
            Message::Ping(payload) => {
                stream
                    .send(Message::Pong(payload))
                    .await
                    .map_err(|e| FeedError::Transport(e.to_string()))?;
            }
            Message::Close(_) => return Err(FeedError::Closed),
            _ => {}
        }
    }
    Err(FeedError::Closed)
}
