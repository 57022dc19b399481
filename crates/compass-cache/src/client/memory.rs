//! In-process key-value store
//!
//! Drop-in implementation of [`KvStore`] backed by a single mutex-guarded
//! map. Used by the test suites and by local development runs where no
//! external store is available. Because every mutation happens under one
//! lock, single-key operations are atomic exactly like the real store's.

use super::KvStore;
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Drop an entry that has outlived its TTL so reads behave like the real
/// store's lazy expiry.
fn purge_expired(entries: &mut HashMap<String, Entry>, key: &str) {
    if entries.get(key).is_some_and(Entry::is_expired) {
        entries.remove(key);
    }
}

/// Mutex-guarded in-process implementation of [`KvStore`]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys
    pub async fn len(&self) -> usize {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| !e.is_expired());
        entries.len()
    }

    /// True when no live keys remain
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Force-expire a key so tests can exercise fallback paths without
    /// sleeping through a real TTL.
    pub async fn force_expire(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

/// Glob match supporting `*` segments, enough for namespace patterns
/// like `conversation:*`.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    // Pattern ends with '*': any remainder matches.
    true
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Entry::new(Value::Str(value.to_string()), ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        match entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Str(s) => Ok(Some(s.clone())),
                _ => Err(CacheError::WrongType {
                    key: key.to_string(),
                    expected: "string",
                }),
            },
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut entries = self.entries.lock().await;
        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        Ok(entries.contains_key(key))
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        Ok(entries.get(key).and_then(|entry| {
            entry
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))
        }))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn incr_by(
        &self,
        key: &str,
        by: i64,
        ttl_if_new: Option<Duration>,
    ) -> CacheResult<i64> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(entry) => {
                let Value::Str(s) = &entry.value else {
                    return Err(CacheError::WrongType {
                        key: key.to_string(),
                        expected: "integer",
                    });
                };
                let current: i64 = s.parse().map_err(|_| CacheError::WrongType {
                    key: key.to_string(),
                    expected: "integer",
                })?;
                let next = current + by;
                entry.value = Value::Str(next.to_string());
                // A counter that lost its expiry gets it re-attached so
                // the window still resets.
                if entry.expires_at.is_none() {
                    if let Some(ttl) = ttl_if_new {
                        entry.expires_at = Some(Instant::now() + ttl);
                    }
                }
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry::new(Value::Str(by.to_string()), ttl_if_new),
                );
                Ok(by)
            }
        }
    }

    async fn push(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<u64> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(entry) => match &mut entry.value {
                Value::List(items) => {
                    items.push(value.to_string());
                    Ok(items.len() as u64)
                }
                _ => Err(CacheError::WrongType {
                    key: key.to_string(),
                    expected: "list",
                }),
            },
            None => {
                entries.insert(
                    key.to_string(),
                    Entry::new(Value::List(vec![value.to_string()]), ttl),
                );
                Ok(1)
            }
        }
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> CacheResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        let items = match entries.get(key) {
            Some(entry) => match &entry.value {
                Value::List(items) => items,
                _ => {
                    return Err(CacheError::WrongType {
                        key: key.to_string(),
                        expected: "list",
                    })
                }
            },
            None => return Ok(Vec::new()),
        };

        let len = items.len() as i64;
        let norm = |i: i64| -> i64 {
            if i < 0 {
                (len + i).max(0)
            } else {
                i.min(len)
            }
        };
        let from = norm(start) as usize;
        let to = (norm(stop) + 1).min(len) as usize;
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(items[from..to].to_vec())
    }

    async fn list_len(&self, key: &str) -> CacheResult<u64> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        match entries.get(key) {
            Some(entry) => match &entry.value {
                Value::List(items) => Ok(items.len() as u64),
                _ => Err(CacheError::WrongType {
                    key: key.to_string(),
                    expected: "list",
                }),
            },
            None => Ok(0),
        }
    }

    async fn sadd(&self, key: &str, member: &str, ttl: Option<Duration>) -> CacheResult<bool> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(entry) => match &mut entry.value {
                Value::Set(members) => Ok(members.insert(member.to_string())),
                _ => Err(CacheError::WrongType {
                    key: key.to_string(),
                    expected: "set",
                }),
            },
            None => {
                let mut members = BTreeSet::new();
                members.insert(member.to_string());
                entries.insert(key.to_string(), Entry::new(Value::Set(members), ttl));
                Ok(true)
            }
        }
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, key);
        match entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Set(members) => Ok(members.iter().cloned().collect()),
                _ => Err(CacheError::WrongType {
                    key: key.to_string(),
                    expected: "set",
                }),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        let mut entries = self.entries.lock().await;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            purge_expired(&mut entries, key);
            let value = match entries.get(key) {
                Some(entry) => match &entry.value {
                    Value::Str(s) => Some(s.clone()),
                    _ => None,
                },
                None => None,
            };
            out.push(value);
        }
        Ok(out)
    }

    async fn mset(&self, pairs: &[(String, String)], ttl: Option<Duration>) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        for (key, value) in pairs {
            entries.insert(key.clone(), Entry::new(Value::Str(value.clone()), ttl));
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| !e.is_expired());
        Ok(entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("conversation:*", "conversation:abc"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*c", "abc"));
        assert!(glob_match("a*c", "axxxc"));
        assert!(!glob_match("conversation:*", "session:abc"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("exact", "exact"));
    }

    #[tokio::test]
    async fn test_string_roundtrip_and_delete() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.exists("k").await.unwrap());
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(store.ttl("k").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
        assert_eq!(store.ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expire_refreshes_lifetime() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(store.expire("k", Duration::from_secs(60)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.exists("k").await.unwrap());
        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_counter_with_ttl_on_create() {
        let store = MemoryStore::new();
        let v = store
            .incr_by("c", 1, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(v, 1);
        let v = store.incr_by("c", 2, None).await.unwrap();
        assert_eq!(v, 3);
        assert!(store.ttl("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_counter_without_expiry_gets_ttl_reattached() {
        let store = MemoryStore::new();
        // Counter created without a TTL (as after a lost expiry hop).
        store.incr_by("c", 1, None).await.unwrap();
        assert_eq!(store.ttl("c").await.unwrap(), None);

        store
            .incr_by("c", 1, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(store.ttl("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_push_and_range() {
        let store = MemoryStore::new();
        assert_eq!(store.push("l", "a", None).await.unwrap(), 1);
        assert_eq!(store.push("l", "b", None).await.unwrap(), 2);
        assert_eq!(store.push("l", "c", None).await.unwrap(), 3);
        assert_eq!(store.range("l", 0, -1).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.range("l", 1, 1).await.unwrap(), vec!["b"]);
        assert_eq!(store.list_len("l").await.unwrap(), 3);
        assert!(store.range("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert!(matches!(
            store.push("k", "x", None).await,
            Err(CacheError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_members() {
        let store = MemoryStore::new();
        assert!(store.sadd("s", "a", None).await.unwrap());
        assert!(!store.sadd("s", "a", None).await.unwrap());
        assert!(store.sadd("s", "b", None).await.unwrap());
        assert_eq!(store.smembers("s").await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_batch_ops() {
        let store = MemoryStore::new();
        store
            .mset(
                &[
                    ("a".to_string(), "1".to_string()),
                    ("b".to_string(), "2".to_string()),
                ],
                None,
            )
            .await
            .unwrap();
        let got = store
            .mget(&["a".to_string(), "missing".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(
            got,
            vec![Some("1".to_string()), None, Some("2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_keys_pattern() {
        let store = MemoryStore::new();
        store.set("conversation:1", "a", None).await.unwrap();
        store.set("conversation:2", "b", None).await.unwrap();
        store.set("session:1", "c", None).await.unwrap();
        let mut keys = store.keys("conversation:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["conversation:1", "conversation:2"]);
    }

    #[tokio::test]
    async fn test_concurrent_push_is_atomic() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.push("log", &format!("m{}", i), None).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.list_len("log").await.unwrap(), 50);
    }
}
