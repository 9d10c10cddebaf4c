//! Feed errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// The node could not be reached.
    #[error("failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// The open stream failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node closed the stream.
    #[error("stream closed by remote")]
    Closed,

    /// The node answered with a JSON-RPC error envelope.
    #[error("rpc error {code}: {message} ({data})")]
    Rpc {
        code: i64,
        message: String,
        data: String,
    },

    /// A payload did not match the expected shape.
    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FeedError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FeedError::Decode(_))
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Decode(err.to_string())
    }
}
