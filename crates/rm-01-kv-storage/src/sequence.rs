//! # Leased Sequences
//!
//! Monotonic `u64` counters persisted through the storage driver.
//!
//! Instead of writing on every allocation, a sequence reserves a window of
//! `bandwidth` values and persists only the window's upper bound (the lease).
//! A new lease is written when the window runs out. An unclean shutdown
//! therefore skips at most `bandwidth - 1` values; [`Sequence::release`]
//! persists the exact consumed boundary so a clean shutdown skips none.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::domain::errors::SequenceError;
use crate::domain::keys::{decode_u64, encode_u64};
use crate::driver::StorageDriver;

struct Lease {
    next: u64,
    leased: u64,
}

/// A named, leased counter.
pub struct Sequence {
    key: Vec<u8>,
    bandwidth: u64,
    driver: Arc<StorageDriver>,
    lease: Mutex<Lease>,
}

impl Sequence {
    /// Load the sequence stored at `key` and take the first lease.
    pub fn new(
        driver: Arc<StorageDriver>,
        key: impl Into<Vec<u8>>,
        bandwidth: u64,
    ) -> Result<Self, SequenceError> {
        let key = key.into();
        if key.is_empty() {
            return Err(SequenceError::EmptyKey);
        }
        if bandwidth == 0 {
            return Err(SequenceError::ZeroBandwidth);
        }

        let next = match driver.get(&key)? {
            Some(raw) => decode_u64(&raw).ok_or(SequenceError::MalformedLease { len: raw.len() })?,
            None => 0,
        };
        let leased = next.checked_add(bandwidth).ok_or(SequenceError::Exhausted)?;
        driver.set(&key, &encode_u64(leased))?;

        Ok(Self {
            key,
            bandwidth,
            driver,
            lease: Mutex::new(Lease { next, leased }),
        })
    }

    /// Hand out the next value.
    pub fn next(&self) -> Result<u64, SequenceError> {
        let mut lease = self.lease.lock();
        if lease.next >= lease.leased {
            let leased = lease
                .next
                .checked_add(self.bandwidth)
                .ok_or(SequenceError::Exhausted)?;
            self.driver.set(&self.key, &encode_u64(leased))?;
            lease.leased = leased;
            debug!(leased, "[rm-01] sequence lease extended");
        }

        let value = lease.next;
        lease.next += 1;
        Ok(value)
    }

    /// Persist the consumed boundary, returning unused leased values.
    pub fn release(&self) -> Result<(), SequenceError> {
        let mut lease = self.lease.lock();
        self.driver.set(&self.key, &encode_u64(lease.next))?;
        lease.leased = lease.next;
        Ok(())
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }
}
