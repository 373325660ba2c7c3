//! In-memory lease store for testing.
//!
//! Deterministic, non-persistent implementation of [`LeaseStore`] that
//! mirrors the atomicity of the production backend without network I/O.
//! TTLs are enforced lazily: an expired entry is treated as absent (and
//! dropped) the next time its key is touched.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::LeaseStore;
use super::LeaseStoreError;

struct LeaseEntry {
    value: String,
    expires_at: Instant,
}

impl LeaseEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory deterministic implementation of [`LeaseStore`].
///
/// Used by the unit and integration tests; all operations run under a
/// single mutex, which gives the same per-key atomicity the scripted
/// backend provides.
#[derive(Default)]
pub struct MemoryLeaseStore {
    entries: Mutex<HashMap<String, LeaseEntry>>,
}

impl MemoryLeaseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) leases, for test assertions.
    pub async fn live_leases(&self) -> usize {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.len()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LeaseStoreError> {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(key) {
            if !existing.is_expired() {
                return Ok(false);
            }
        }
        entries.insert(key.to_string(), LeaseEntry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        });
        Ok(true)
    }

    async fn remove_if_match(&self, key: &str, value: &str) -> Result<bool, LeaseStoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(existing) if existing.is_expired() => {
                entries.remove(key);
                Ok(false)
            }
            Some(existing) if existing.value == value => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_if_match(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LeaseStoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(existing) if !existing.is_expired() && existing.value == value => {
                existing.expires_at = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_if_absent_rejects_live_key() {
        let store = MemoryLeaseStore::new();
        assert!(store.put_if_absent("k", "a", Duration::from_secs(1)).await.unwrap());
        assert!(!store.put_if_absent("k", "b", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn expired_key_is_reacquirable() {
        let store = MemoryLeaseStore::new();
        assert!(store.put_if_absent("k", "a", Duration::from_millis(20)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.put_if_absent("k", "b", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn remove_requires_matching_value() {
        let store = MemoryLeaseStore::new();
        store.put_if_absent("k", "a", Duration::from_secs(1)).await.unwrap();

        assert!(!store.remove_if_match("k", "other").await.unwrap());
        assert_eq!(store.live_leases().await, 1);

        assert!(store.remove_if_match("k", "a").await.unwrap());
        assert_eq!(store.live_leases().await, 0);

        // Absent key is a silent no-op.
        assert!(!store.remove_if_match("k", "a").await.unwrap());
    }

    #[tokio::test]
    async fn expire_extends_only_matching_live_key() {
        let store = MemoryLeaseStore::new();
        store.put_if_absent("k", "a", Duration::from_millis(50)).await.unwrap();

        assert!(!store.expire_if_match("k", "other", Duration::from_secs(1)).await.unwrap());
        assert!(store.expire_if_match("k", "a", Duration::from_millis(200)).await.unwrap());

        // Past the original TTL but inside the extension.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!store.put_if_absent("k", "b", Duration::from_secs(1)).await.unwrap());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!store.expire_if_match("k", "a", Duration::from_secs(1)).await.unwrap());
    }
}
