//! Lease store trait and implementations.
//!
//! The coordinator needs three atomic per-key operations from its store:
//! create-if-absent with a TTL, delete-if-value-matches, and
//! reset-TTL-if-value-matches. The compare and the action must happen in a
//! single atomic step at the store; a read followed by a separate write
//! would let one holder destroy or refresh another holder's lease.

use std::time::Duration;

use async_trait::async_trait;
use snafu::Snafu;

mod memory;
mod redis;

pub use memory::MemoryLeaseStore;
pub use self::redis::RedisLeaseStore;

/// Errors from the lease store backend.
#[derive(Debug, Snafu)]
pub enum LeaseStoreError {
    /// The backing store rejected or failed the operation.
    #[snafu(display("lease store backend error: {message}"))]
    Backend {
        /// Description of the backend failure.
        message: String,
    },
}

/// Atomic per-key leasing operations.
///
/// Every method returns `Ok(true)` when the atomic predicate held and the
/// action was applied, `Ok(false)` when the predicate failed (key present,
/// value mismatch, or key absent).
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically set `key = value` with expiry `ttl` iff the key is absent.
    async fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LeaseStoreError>;

    /// Atomically delete `key` iff its current value equals `value`.
    async fn remove_if_match(&self, key: &str, value: &str) -> Result<bool, LeaseStoreError>;

    /// Atomically reset `key`'s expiry to `ttl` iff its current value
    /// equals `value`.
    async fn expire_if_match(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LeaseStoreError>;
}

// Blanket implementation for Arc<T>
#[async_trait]
impl<T: LeaseStore + ?Sized> LeaseStore for std::sync::Arc<T> {
    async fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LeaseStoreError> {
        (**self).put_if_absent(key, value, ttl).await
    }

    async fn remove_if_match(&self, key: &str, value: &str) -> Result<bool, LeaseStoreError> {
        (**self).remove_if_match(key, value).await
    }

    async fn expire_if_match(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LeaseStoreError> {
        (**self).expire_if_match(key, value, ttl).await
    }
}
