//! Cache facade
//!
//! Adds key namespacing, JSON (de)serialization and batch operations on
//! top of the raw [`KvStore`] client. All higher layers (session store,
//! conversation manager, middleware) go through a facade and never touch
//! raw keys.
//!
//! Serialization rule: a value that is a plain string is stored verbatim;
//! anything else is stored as its JSON encoding. On read, a best-effort
//! JSON decode is attempted and the raw string is returned when decoding
//! fails. Callers store heterogeneous payloads and must never crash on a
//! malformed or legacy entry.

use crate::client::KvStore;
use crate::error::CacheResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Namespaced, JSON-aware view over a [`KvStore`]
#[derive(Clone)]
pub struct CacheFacade {
    store: Arc<dyn KvStore>,
    prefix: String,
    default_ttl: Duration,
}

impl std::fmt::Debug for CacheFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFacade")
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl CacheFacade {
    /// Create a facade with a key prefix and a default TTL
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    /// The underlying store handle
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Default TTL applied when a caller passes `None`
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn ttl_or_default(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or(self.default_ttl)
    }

    fn encode<T: Serialize>(value: &T) -> CacheResult<String> {
        let json = serde_json::to_value(value)?;
        Ok(match json {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// Tolerant decode: JSON when it parses, raw string otherwise.
    fn decode(raw: String) -> Value {
        serde_json::from_str(&raw).unwrap_or(Value::String(raw))
    }

    /// Store a serializable value under the namespaced key
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let encoded = Self::encode(value)?;
        self.store
            .set(&self.key(key), &encoded, Some(self.ttl_or_default(ttl)))
            .await
    }

    /// Fetch and decode a typed value; decode failures surface as
    /// serialization errors so callers can fall back per their policy.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.store.get(&self.key(key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Fetch with the tolerant decode rule (never fails on content)
    pub async fn get_value(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.store.get(&self.key(key)).await?.map(Self::decode))
    }

    /// Delete a namespaced key
    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.store.delete(&self.key(key)).await
    }

    /// Check existence of a namespaced key
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.store.exists(&self.key(key)).await
    }

    /// Remaining TTL of a namespaced key
    pub async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.store.ttl(&self.key(key)).await
    }

    /// Refresh a namespaced key's TTL
    pub async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.store.expire(&self.key(key), ttl).await
    }

    /// Atomic counter increment (window TTL attached on creation)
    pub async fn incr_by(
        &self,
        key: &str,
        by: i64,
        ttl_if_new: Option<Duration>,
    ) -> CacheResult<i64> {
        self.store.incr_by(&self.key(key), by, ttl_if_new).await
    }

    /// Atomic list append of a serialized value, returns new length
    pub async fn push<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<u64> {
        let encoded = Self::encode(value)?;
        self.store
            .push(&self.key(key), &encoded, Some(self.ttl_or_default(ttl)))
            .await
    }

    /// Read a list range with the tolerant decode rule
    pub async fn range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<Value>> {
        let raw = self.store.range(&self.key(key), start, stop).await?;
        Ok(raw.into_iter().map(Self::decode).collect())
    }

    /// List length for a namespaced key
    pub async fn list_len(&self, key: &str) -> CacheResult<u64> {
        self.store.list_len(&self.key(key)).await
    }

    /// Batch store with a shared TTL
    pub async fn set_many<T: Serialize>(
        &self,
        pairs: &[(String, T)],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let mut encoded = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            encoded.push((self.key(key), Self::encode(value)?));
        }
        self.store
            .mset(&encoded, Some(self.ttl_or_default(ttl)))
            .await
    }

    /// Batch fetch, positionally aligned, tolerant decode
    pub async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<Value>>> {
        let namespaced: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let raw = self.store.mget(&namespaced).await?;
        Ok(raw.into_iter().map(|v| v.map(Self::decode)).collect())
    }

    /// Enumerate namespaced keys under a sub-prefix (maintenance only).
    /// Returned keys have the facade prefix stripped.
    pub async fn keys_under(&self, sub_prefix: &str) -> CacheResult<Vec<String>> {
        let pattern = format!("{}{}*", self.prefix, sub_prefix);
        let keys = self.store.keys(&pattern).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }

    /// Delete every key under a sub-prefix, returning the count.
    ///
    /// O(number of matching keys); cleanup and testing only.
    pub async fn clear_prefix(&self, sub_prefix: &str) -> CacheResult<usize> {
        let keys = self.keys_under(sub_prefix).await?;
        let mut removed = 0;
        for key in &keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        tracing::debug!(prefix = %sub_prefix, removed, "cleared cache namespace");
        Ok(removed)
    }
}
