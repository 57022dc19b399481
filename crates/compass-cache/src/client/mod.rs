//! Key-value cache client
//!
//! Thin wrapper around a network-accessible in-memory key-value store.
//! The trait is the seam between the cache tier and everything above it:
//! `RedisStore` talks the wire protocol, `MemoryStore` is a full
//! in-process implementation used by tests and local runs.
//!
//! Failure policy: transport and serialization problems surface as typed
//! `CacheError`s, never panics. The cache is an optimization — callers
//! must be able to proceed as if the entry were simply absent.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Operations the cache tier needs from the underlying store.
///
/// All operations are safe to call concurrently; the store serializes
/// conflicting writes to the same key. `push` is the atomic list-append
/// primitive that message logs rely on — it must never be emulated with
/// a read-modify-write sequence.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Set a string value with an optional TTL
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Get a string value
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Check key existence
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remaining TTL for a key; `None` when absent or without expiry
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Set or refresh a key's TTL, returning whether the key existed
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Atomically increment a counter, creating it when absent.
    /// `ttl_if_new` is attached on creation and re-attached whenever the
    /// key carries no expiry, so a lost expiry hop cannot leave the
    /// counter immortal. Returns the post-increment value.
    async fn incr_by(
        &self,
        key: &str,
        by: i64,
        ttl_if_new: Option<Duration>,
    ) -> CacheResult<i64>;

    /// Atomically append to a list, returning the new length
    async fn push(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<u64>;

    /// Read a list range (inclusive indices, negative from the end)
    async fn range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<String>>;

    /// List length (0 when absent)
    async fn list_len(&self, key: &str) -> CacheResult<u64>;

    /// Add a member to a set, returning whether it was newly added
    async fn sadd(&self, key: &str, member: &str, ttl: Option<Duration>) -> CacheResult<bool>;

    /// All members of a set
    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>>;

    /// Batch get; result is positionally aligned with `keys`
    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>>;

    /// Batch set with a shared TTL
    async fn mset(&self, pairs: &[(String, String)], ttl: Option<Duration>) -> CacheResult<()>;

    /// Enumerate keys matching a glob pattern.
    ///
    /// Maintenance/testing only: O(keyspace) and possibly eventually
    /// consistent on the real store. Never call this on a request path.
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;
}
