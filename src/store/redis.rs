//! Redis-backed lease store.
//!
//! Acquisition maps to `SET key value PX ttl NX`; release and extension
//! are Lua scripts so the value comparison and the destructive action
//! happen in one atomic step at the server.

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;

use super::LeaseStore;
use super::LeaseStoreError;

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// [`LeaseStore`] over a Redis-compatible server.
///
/// The connection is supplied by the caller and shared by cloning the
/// [`ConnectionManager`]; this store neither opens nor closes it. Dropping
/// the last clone releases the underlying connection.
pub struct RedisLeaseStore {
    connection: ConnectionManager,
    release_script: Script,
    extend_script: Script,
}

impl RedisLeaseStore {
    /// Wrap a caller-supplied connection.
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            release_script: Script::new(RELEASE_SCRIPT),
            extend_script: Script::new(EXTEND_SCRIPT),
        }
    }
}

fn backend_error(source: redis::RedisError) -> LeaseStoreError {
    LeaseStoreError::Backend {
        message: source.to_string(),
    }
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LeaseStoreError> {
        let mut connection = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .arg("NX")
            .query_async(&mut connection)
            .await
            .map_err(backend_error)?;
        Ok(reply.is_some())
    }

    async fn remove_if_match(&self, key: &str, value: &str) -> Result<bool, LeaseStoreError> {
        let mut connection = self.connection.clone();
        let removed: i64 = self
            .release_script
            .key(key)
            .arg(value)
            .invoke_async(&mut connection)
            .await
            .map_err(backend_error)?;
        Ok(removed == 1)
    }

    async fn expire_if_match(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LeaseStoreError> {
        let mut connection = self.connection.clone();
        let extended: i64 = self
            .extend_script
            .key(key)
            .arg(value)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut connection)
            .await
            .map_err(backend_error)?;
        Ok(extended == 1)
    }
}
