//! In-process query access to the replica application.
//!
//! Queries take the injection lock, so they only ever see committed blocks.

use std::sync::Arc;

use rm_04_mantlemint::{Mantlemint, MantlemintError};
use shared_types::{RequestQuery, ResponseQuery};
use tokio::sync::Mutex;

use crate::mantle::Mantle;

#[derive(Clone)]
pub struct LocalClient {
    mantlemint: Arc<Mutex<Mantlemint>>,
}

impl LocalClient {
    pub fn new(mantle: &Mantle) -> Self {
        Self {
            mantlemint: mantle.replica(),
        }
    }

    /// Query `path` with `data` at `height` (`0` for latest).
    pub async fn query(
        &self,
        path: &str,
        data: &[u8],
        height: u64,
    ) -> Result<ResponseQuery, MantlemintError> {
        self.query_with_options(RequestQuery {
            path: path.to_string(),
            data: data.to_vec(),
            height,
            prove: false,
        })
        .await
    }

    pub async fn query_with_options(
        &self,
        request: RequestQuery,
    ) -> Result<ResponseQuery, MantlemintError> {
        self.mantlemint.lock().await.query(request)
    }
}
