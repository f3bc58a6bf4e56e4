// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key/value store implementations.

use std::time::Duration;
use thiserror::Error;

/// Errors reaching the backing store. A missing or malformed value is
/// never an error — readers see `None`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// TTL-capable key/value store.
///
/// Every write carries a TTL; nothing in the cache is permanent.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Set only if the key does not exist; the lock primitive.
    /// Returns `true` when this call created the key.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Remaining TTL, `None` when the key is absent or persistent.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;
}

/// Production store over a Redis-compatible server.
#[derive(Clone)]
pub struct RedisStore {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisStore {
    /// Connect to the configured server.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut con = self.connection.clone();
        redis::cmd("PING").query_async::<()>(&mut con).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut con = self.connection.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut con).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut con = self.connection.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut con)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut con = self.connection.clone();
        redis::cmd("DEL").arg(key).query_async::<()>(&mut con).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut con = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut con)
            .await?;
        Ok(reply.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut con = self.connection.clone();
        let secs: i64 = redis::cmd("TTL").arg(key).query_async(&mut con).await?;
        Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
    }
}

/// In-process store with clock-driven expiry, for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct MemoryStore<C: dm_core::Clock> {
    clock: C,
    entries: parking_lot::Mutex<std::collections::HashMap<String, (String, std::time::Instant)>>,
}

#[cfg(any(test, feature = "test-support"))]
impl<C: dm_core::Clock> MemoryStore<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            entries: parking_lot::Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn prune(&self) {
        let now = self.clock.now();
        self.entries.lock().retain(|_, (_, expires)| *expires > now);
    }

    /// All live keys, for assertions.
    pub fn keys(&self) -> Vec<String> {
        self.prune();
        self.entries.lock().keys().cloned().collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait::async_trait]
impl<C: dm_core::Clock> KeyStore for MemoryStore<C> {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.prune();
        Ok(self.entries.lock().get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires = self.clock.now() + ttl;
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.prune();
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        let expires = self.clock.now() + ttl;
        entries.insert(key.to_string(), (value.to_string(), expires));
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        self.prune();
        let now = self.clock.now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .map(|(_, expires)| expires.saturating_duration_since(now)))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
