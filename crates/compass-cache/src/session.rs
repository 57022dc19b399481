//! Session store
//!
//! Per-user session blobs, preference blobs and cached search results,
//! all keyed by user identity and all time-boxed. Sessions use a sliding
//! expiry: reading one refreshes its TTL, so active users are never
//! evicted mid-use while idle sessions age out on their own.
//!
//! No schema is imposed on the payloads beyond "JSON-serializable" —
//! this layer owns lifetime and access discipline, not validation.

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::facade::CacheFacade;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

const SESSION_NS: &str = "session:";
const PREFS_NS: &str = "prefs:";
const JOBSEARCH_NS: &str = "jobsearch:";

/// User session, preference and search-result caching
#[derive(Debug, Clone)]
pub struct SessionStore {
    cache: CacheFacade,
    session_ttl: Duration,
    prefs_ttl: Duration,
    search_ttl: Duration,
}

impl SessionStore {
    /// Create a session store over a facade, lifetimes from `config`
    pub fn new(cache: CacheFacade, config: &CacheConfig) -> Self {
        Self {
            cache,
            session_ttl: config.session_ttl,
            prefs_ttl: config.prefs_ttl,
            search_ttl: config.search_ttl,
        }
    }

    /// Store a user's session payload with the sliding session TTL
    pub async fn set_user_session(&self, user_id: &str, payload: &Value) -> CacheResult<()> {
        let key = format!("{}{}", SESSION_NS, user_id);
        self.cache.set(&key, payload, Some(self.session_ttl)).await
    }

    /// Fetch a user's session, refreshing its TTL on hit
    pub async fn get_user_session(&self, user_id: &str) -> CacheResult<Option<Value>> {
        let key = format!("{}{}", SESSION_NS, user_id);
        let session = self.cache.get_value(&key).await?;
        if session.is_some() {
            // Sliding expiry: an active session never dies mid-use.
            self.cache.expire(&key, self.session_ttl).await?;
        }
        Ok(session)
    }

    /// Drop a user's session
    pub async fn delete_user_session(&self, user_id: &str) -> CacheResult<bool> {
        self.cache
            .delete(&format!("{}{}", SESSION_NS, user_id))
            .await
    }

    /// Store a user's preference blob
    pub async fn set_user_preferences(&self, user_id: &str, prefs: &Value) -> CacheResult<()> {
        let key = format!("{}{}", PREFS_NS, user_id);
        self.cache.set(&key, prefs, Some(self.prefs_ttl)).await
    }

    /// Fetch a user's preference blob
    pub async fn get_user_preferences(&self, user_id: &str) -> CacheResult<Option<Value>> {
        self.cache
            .get_value(&format!("{}{}", PREFS_NS, user_id))
            .await
    }

    /// Cache a job-search result set for a user/query/filter combination
    pub async fn cache_job_search(
        &self,
        user_id: &str,
        query: &str,
        filters: &HashMap<String, String>,
        results: &Value,
    ) -> CacheResult<()> {
        let key = Self::search_key(user_id, query, filters);
        self.cache.set(&key, results, Some(self.search_ttl)).await
    }

    /// Look up a previously cached job search
    pub async fn get_cached_job_search(
        &self,
        user_id: &str,
        query: &str,
        filters: &HashMap<String, String>,
    ) -> CacheResult<Option<Value>> {
        self.cache
            .get_value(&Self::search_key(user_id, query, filters))
            .await
    }

    /// Canonical search key: filters are sorted by name before being
    /// folded into the hash, so semantically identical filter sets map to
    /// the same key regardless of insertion order.
    fn search_key(user_id: &str, query: &str, filters: &HashMap<String, String>) -> String {
        let mut sorted: Vec<(&String, &String)> = filters.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = DefaultHasher::new();
        query.trim().hash(&mut hasher);
        for (name, value) in sorted {
            name.hash(&mut hasher);
            value.hash(&mut hasher);
        }

        format!("{}{}:{:x}", JOBSEARCH_NS, user_id, hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn store_with_ttls(session_ttl: Duration) -> SessionStore {
        let kv = Arc::new(MemoryStore::new());
        let cache = CacheFacade::new(kv, "compass:", Duration::from_secs(60));
        let config = CacheConfig {
            session_ttl,
            ..CacheConfig::default()
        };
        SessionStore::new(cache, &config)
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let sessions = store_with_ttls(Duration::from_secs(60));
        let payload = json!({"last_page": "/jobs", "cart": []});

        sessions.set_user_session("u-1", &payload).await.unwrap();
        let loaded = sessions.get_user_session("u-1").await.unwrap().unwrap();
        assert_eq!(loaded, payload);

        assert!(sessions.delete_user_session("u-1").await.unwrap());
        assert!(sessions.get_user_session("u-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sliding_expiry_keeps_active_sessions_alive() {
        let sessions = store_with_ttls(Duration::from_millis(100));
        sessions
            .set_user_session("u-1", &json!({"active": true}))
            .await
            .unwrap();

        // Keep touching the session past its original lifetime.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert!(sessions.get_user_session("u-1").await.unwrap().is_some());
        }

        // Left idle, it finally expires.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(sessions.get_user_session("u-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_key_is_filter_order_insensitive() {
        let sessions = store_with_ttls(Duration::from_secs(60));
        let results = json!([{"id": "job-1", "title": "Solar Installer"}]);

        let mut forward = HashMap::new();
        forward.insert("location".to_string(), "MA".to_string());
        forward.insert("type".to_string(), "full_time".to_string());

        sessions
            .cache_job_search("u-1", "solar jobs", &forward, &results)
            .await
            .unwrap();

        // Same filters built in the opposite insertion order must hit.
        let mut reversed = HashMap::new();
        reversed.insert("type".to_string(), "full_time".to_string());
        reversed.insert("location".to_string(), "MA".to_string());

        let hit = sessions
            .get_cached_job_search("u-1", "solar jobs", &reversed)
            .await
            .unwrap();
        assert_eq!(hit, Some(results));
    }

    #[tokio::test]
    async fn test_search_key_distinguishes_queries_and_users() {
        let sessions = store_with_ttls(Duration::from_secs(60));
        let filters = HashMap::new();
        sessions
            .cache_job_search("u-1", "solar jobs", &filters, &json!(["a"]))
            .await
            .unwrap();

        assert!(sessions
            .get_cached_job_search("u-1", "wind jobs", &filters)
            .await
            .unwrap()
            .is_none());
        assert!(sessions
            .get_cached_job_search("u-2", "solar jobs", &filters)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_preferences_are_independent_of_session() {
        let sessions = store_with_ttls(Duration::from_secs(60));
        sessions
            .set_user_preferences("u-1", &json!({"theme": "dark"}))
            .await
            .unwrap();
        sessions.delete_user_session("u-1").await.unwrap();
        assert!(sessions
            .get_user_preferences("u-1")
            .await
            .unwrap()
            .is_some());
    }
}
