//! Redis-backed key-value store
//!
//! Wraps a `ConnectionManager` (shared, auto-reconnecting connection) and
//! bounds every round-trip with a timeout. Connection lifecycle belongs
//! to the process entry point: connect once at startup, inject the store
//! handle into each component.

use super::KvStore;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::future::Future;
use std::time::Duration;

/// [`KvStore`] implementation over the wire protocol
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to the store described by `config`.
    ///
    /// Fails when the server is unreachable within the operation timeout;
    /// the process is expected to refuse to start in that case.
    pub async fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let url = config.redis.connection_url();
        tracing::info!(host = %config.redis.host, port = config.redis.port, "connecting to cache store");

        let client = redis::Client::open(url.as_str())?;
        let manager = tokio::time::timeout(config.op_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(config.op_timeout))??;

        Ok(Self {
            manager,
            op_timeout: config.op_timeout,
        })
    }

    async fn run<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        self.run(async move {
            let _: () = cmd.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run(async move {
            let value: Option<String> = cmd.query_async(&mut conn).await?;
            Ok(value)
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        self.run(async move {
            let removed: i64 = cmd.query_async(&mut conn).await?;
            Ok(removed > 0)
        })
        .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        self.run(async move {
            let found: i64 = cmd.query_async(&mut conn).await?;
            Ok(found > 0)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("TTL");
        cmd.arg(key);
        self.run(async move {
            let secs: i64 = cmd.query_async(&mut conn).await?;
            // -2 = absent, -1 = no expiry
            Ok(if secs >= 0 {
                Some(Duration::from_secs(secs as u64))
            } else {
                None
            })
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(ttl.as_secs().max(1));
        self.run(async move {
            let set: i64 = cmd.query_async(&mut conn).await?;
            Ok(set > 0)
        })
        .await
    }

    async fn incr_by(
        &self,
        key: &str,
        by: i64,
        ttl_if_new: Option<Duration>,
    ) -> CacheResult<i64> {
        let mut conn = self.manager.clone();
        let mut incr = redis::cmd("INCRBY");
        incr.arg(key).arg(by);
        let value = self
            .run(async {
                let value: i64 = incr.query_async(&mut conn).await?;
                Ok(value)
            })
            .await?;

        // Attach the window TTL when the increment created the key, and
        // re-attach it when a previous EXPIRE hop was lost: a counter
        // without an expiry never resets.
        if let Some(ttl) = ttl_if_new {
            if value == by || self.ttl(key).await?.is_none() {
                self.expire(key, ttl).await?;
            }
        }
        Ok(value)
    }

    async fn push(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<u64> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("RPUSH");
        cmd.arg(key).arg(value);
        let len = self
            .run(async {
                let len: u64 = cmd.query_async(&mut conn).await?;
                Ok(len)
            })
            .await?;

        if len == 1 {
            if let Some(ttl) = ttl {
                self.expire(key, ttl).await?;
            }
        }
        Ok(len)
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("LRANGE");
        cmd.arg(key).arg(start).arg(stop);
        self.run(async move {
            let items: Vec<String> = cmd.query_async(&mut conn).await?;
            Ok(items)
        })
        .await
    }

    async fn list_len(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("LLEN");
        cmd.arg(key);
        self.run(async move {
            let len: u64 = cmd.query_async(&mut conn).await?;
            Ok(len)
        })
        .await
    }

    async fn sadd(&self, key: &str, member: &str, ttl: Option<Duration>) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SADD");
        cmd.arg(key).arg(member);
        let added = self
            .run(async {
                let added: i64 = cmd.query_async(&mut conn).await?;
                Ok(added)
            })
            .await?;

        if added > 0 {
            if let Some(ttl) = ttl {
                self.expire(key, ttl).await?;
            }
        }
        Ok(added > 0)
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SMEMBERS");
        cmd.arg(key);
        self.run(async move {
            let members: Vec<String> = cmd.query_async(&mut conn).await?;
            Ok(members)
        })
        .await
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }
        self.run(async move {
            let values: Vec<Option<String>> = cmd.query_async(&mut conn).await?;
            Ok(values)
        })
        .await
    }

    async fn mset(&self, pairs: &[(String, String)], ttl: Option<Duration>) -> CacheResult<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("MSET");
        for (key, value) in pairs {
            cmd.arg(key).arg(value);
        }
        self.run(async {
            let _: () = cmd.query_async(&mut conn).await?;
            Ok(())
        })
        .await?;

        // MSET carries no expiry; apply the shared TTL per key.
        if let Some(ttl) = ttl {
            for (key, _) in pairs {
                self.expire(key, ttl).await?;
            }
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("KEYS");
        cmd.arg(pattern);
        self.run(async move {
            let keys: Vec<String> = cmd.query_async(&mut conn).await?;
            Ok(keys)
        })
        .await
    }
}
