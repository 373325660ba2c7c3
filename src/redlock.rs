//! Single-store lease client.
//!
//! Multi-key leasing over a [`LeaseStore`]: an acquisition succeeds only
//! if every key is inserted; on partial success the inserted keys are
//! rolled back before reporting the set unavailable. Release and extension
//! are guarded by the lease token, so a lease that has expired and been
//! taken by another holder is never touched.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tracing::debug;
use tracing::warn;

use crate::store::LeaseStore;
use crate::store::LeaseStoreError;

/// Outcome of a multi-key acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Every key was inserted; the lease is held.
    Acquired,
    /// At least one key was already held; nothing is held on return.
    Unavailable,
}

/// Outcome of a lease extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    /// Every key's TTL was reset.
    Extended,
    /// Some key no longer carries this lease's token; the extension task
    /// should stop.
    Lost,
}

/// Generate a fresh lease token: 20 cryptographically-strong random
/// bytes, hex-encoded. A token is never reused across attempts.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 20];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Lease client over a single coordination store.
pub struct RedlockClient<S: LeaseStore + ?Sized> {
    store: Arc<S>,
}

impl<S: LeaseStore + ?Sized> Clone for RedlockClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: LeaseStore + ?Sized> RedlockClient<S> {
    /// Create a client over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Attempt to lease every key in `keys` with `token` for `ttl`.
    ///
    /// Keys the store did insert are released before `Unavailable` is
    /// returned, so the caller never holds a partial lease. A store error
    /// mid-sequence triggers the same rollback before propagating.
    pub async fn try_acquire(
        &self,
        keys: &[String],
        token: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome, LeaseStoreError> {
        for (index, key) in keys.iter().enumerate() {
            match self.store.put_if_absent(key, token, ttl).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(key = %key, "key already leased, rolling back partial acquisition");
                    self.release(&keys[..index], token).await;
                    return Ok(AcquireOutcome::Unavailable);
                }
                Err(error) => {
                    self.release(&keys[..index], token).await;
                    return Err(error);
                }
            }
        }
        Ok(AcquireOutcome::Acquired)
    }

    /// Release every key whose value still equals `token`.
    ///
    /// A mismatched or absent key means the lease already expired or was
    /// taken over; both are ignored. Store errors are logged, never
    /// surfaced: TTL expiry reclaims the key either way.
    pub async fn release(&self, keys: &[String], token: &str) {
        for key in keys {
            match self.store.remove_if_match(key, token).await {
                Ok(true) => debug!(key = %key, "lease released"),
                Ok(false) => debug!(key = %key, "lease already gone at release"),
                Err(error) => {
                    warn!(key = %key, error = %error, "lease release failed (will expire via TTL)");
                }
            }
        }
    }

    /// Reset every key's TTL to `ttl`, guarded by `token`.
    ///
    /// Any key that fails the guard makes the whole lease `Lost`; store
    /// errors count as lost too, since the lease state is then unknown and
    /// the TTL is about to resolve it.
    pub async fn extend(&self, keys: &[String], token: &str, ttl: Duration) -> ExtendOutcome {
        for key in keys {
            match self.store.expire_if_match(key, token, ttl).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(key = %key, "lease no longer held at extension");
                    return ExtendOutcome::Lost;
                }
                Err(error) => {
                    warn!(key = %key, error = %error, "lease extension failed");
                    return ExtendOutcome::Lost;
                }
            }
        }
        ExtendOutcome::Extended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLeaseStore;

    const TTL: Duration = Duration::from_secs(1);

    fn client() -> (RedlockClient<MemoryLeaseStore>, Arc<MemoryLeaseStore>) {
        let store = Arc::new(MemoryLeaseStore::new());
        (RedlockClient::new(store.clone()), store)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn tokens_are_unique_and_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn acquires_all_keys_or_none() {
        let (client, store) = client();
        let contested = keys(&["a", "b", "c"]);

        // Someone else holds "b".
        store.put_if_absent("b", "other", TTL).await.unwrap();

        let token = generate_token();
        let outcome = client.try_acquire(&contested, &token, TTL).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Unavailable);

        // "a" was rolled back: a fresh full acquisition of {a} succeeds.
        let retry_token = generate_token();
        let outcome = client.try_acquire(&keys(&["a"]), &retry_token, TTL).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Acquired);
    }

    #[tokio::test]
    async fn release_is_token_guarded() {
        let (client, store) = client();
        let held = keys(&["a"]);
        let token = generate_token();

        client.try_acquire(&held, &token, TTL).await.unwrap();

        // A stranger's release leaves the lease in place.
        client.release(&held, "not-the-token").await;
        assert_eq!(store.live_leases().await, 1);

        client.release(&held, &token).await;
        assert_eq!(store.live_leases().await, 0);

        // Double release is harmless.
        client.release(&held, &token).await;
    }

    #[tokio::test]
    async fn extend_reports_lost_when_any_key_slips() {
        let (client, store) = client();
        let held = keys(&["a", "b"]);
        let token = generate_token();

        client.try_acquire(&held, &token, TTL).await.unwrap();
        assert_eq!(client.extend(&held, &token, TTL).await, ExtendOutcome::Extended);

        // "b" expires and is taken by another holder.
        store.remove_if_match("b", &token).await.unwrap();
        store.put_if_absent("b", "other", TTL).await.unwrap();

        assert_eq!(client.extend(&held, &token, TTL).await, ExtendOutcome::Lost);
    }
}
