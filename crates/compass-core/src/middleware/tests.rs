//! Middleware layer tests

use super::*;
use crate::middleware::session_guard::MockTokenVerifier;
use async_trait::async_trait;
use compass_cache::{CacheConfig, CacheError, CacheFacade, CacheResult, KvStore, MemoryStore, SessionStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn facade() -> CacheFacade {
    CacheFacade::new(
        Arc::new(MemoryStore::new()),
        "compass:",
        Duration::from_secs(60),
    )
}

/// Store where every call fails, for fail-open behavior
#[derive(Debug)]
struct DownStore;

#[async_trait]
impl KvStore for DownStore {
    async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> CacheResult<()> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn get(&self, _: &str) -> CacheResult<Option<String>> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn delete(&self, _: &str) -> CacheResult<bool> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn exists(&self, _: &str) -> CacheResult<bool> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn ttl(&self, _: &str) -> CacheResult<Option<Duration>> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn expire(&self, _: &str, _: Duration) -> CacheResult<bool> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn incr_by(&self, _: &str, _: i64, _: Option<Duration>) -> CacheResult<i64> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn push(&self, _: &str, _: &str, _: Option<Duration>) -> CacheResult<u64> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn range(&self, _: &str, _: i64, _: i64) -> CacheResult<Vec<String>> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn list_len(&self, _: &str) -> CacheResult<u64> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn sadd(&self, _: &str, _: &str, _: Option<Duration>) -> CacheResult<bool> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn smembers(&self, _: &str) -> CacheResult<Vec<String>> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn mget(&self, _: &[String]) -> CacheResult<Vec<Option<String>>> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn mset(&self, _: &[(String, String)], _: Option<Duration>) -> CacheResult<()> {
        Err(CacheError::Connection("down".to_string()))
    }
    async fn keys(&self, _: &str) -> CacheResult<Vec<String>> {
        Err(CacheError::Connection("down".to_string()))
    }
}

#[tokio::test]
async fn test_rate_limit_rejects_over_budget_then_recovers() {
    let limiter = RateLimiter::new(facade());
    let window = Duration::from_millis(100);

    for _ in 0..3 {
        let decision = limiter.check("1.2.3.4", 3, window).await;
        assert!(decision.is_allowed(), "within budget must be allowed");
    }

    // The N+1th request in the window is rejected with 429 metadata.
    let decision = limiter.check("1.2.3.4", 3, window).await;
    assert!(!decision.is_allowed());
    assert_eq!(decision.status_code(), Some(429));
    match &decision {
        RateLimitDecision::Rejected { limit, current, .. } => {
            assert_eq!(*limit, 3);
            assert_eq!(*current, 4);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    let headers = decision.headers(3);
    assert!(headers
        .iter()
        .any(|(name, value)| name == "X-RateLimit-Remaining" && value == "0"));

    // After the window slides, a new request passes.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(limiter.check("1.2.3.4", 3, window).await.is_allowed());
}

#[tokio::test]
async fn test_rate_limit_identities_are_independent() {
    let limiter = RateLimiter::new(facade());
    let window = Duration::from_secs(60);

    assert!(limiter.check("a", 1, window).await.is_allowed());
    assert!(!limiter.check("a", 1, window).await.is_allowed());
    assert!(limiter.check("b", 1, window).await.is_allowed());
}

#[tokio::test]
async fn test_rate_limit_counter_without_expiry_still_resets() {
    let store = MemoryStore::new();
    let cache = CacheFacade::new(Arc::new(store.clone()), "compass:", Duration::from_secs(60));
    let limiter = RateLimiter::new(cache);
    let window = Duration::from_millis(100);

    // A counter that lost its window TTL must not reject forever.
    store
        .incr_by("compass:ratelimit:1.2.3.4", 3, None)
        .await
        .unwrap();

    // Over budget right now, but the check re-attaches the window...
    assert!(!limiter.check("1.2.3.4", 3, window).await.is_allowed());

    // ...so the window still slides and the client recovers.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(limiter.check("1.2.3.4", 3, window).await.is_allowed());
}

#[tokio::test]
async fn test_rate_limit_fails_open_when_store_is_down() {
    let cache = CacheFacade::new(Arc::new(DownStore), "compass:", Duration::from_secs(60));
    let limiter = RateLimiter::new(cache);

    for _ in 0..10 {
        let decision = limiter.check("1.2.3.4", 1, Duration::from_secs(60)).await;
        assert!(decision.is_allowed(), "outages must not reject traffic");
    }
}

#[test]
fn test_client_identity_hashes_token_fragment() {
    let bare = client_identity("10.0.0.1", None);
    assert_eq!(bare, "10.0.0.1");

    let with_token = client_identity("10.0.0.1", Some("secret-token"));
    assert!(with_token.starts_with("10.0.0.1:"));
    assert!(!with_token.contains("secret-token"));
    assert_eq!(with_token, client_identity("10.0.0.1", Some("secret-token")));
    assert_ne!(with_token, client_identity("10.0.0.1", Some("other-token")));
}

fn session_store() -> SessionStore {
    SessionStore::new(facade(), &CacheConfig::default())
}

#[tokio::test]
async fn test_session_guard_accepts_verified_active_session() {
    let sessions = session_store();
    sessions
        .set_user_session("u-1", &json!({"plan": "pro"}))
        .await
        .unwrap();

    let mut verifier = MockTokenVerifier::new();
    verifier
        .expect_verify()
        .withf(|token| token == "tok-1")
        .returning(|_| Some("u-1".to_string()));

    let guard = SessionGuard::new(Arc::new(verifier), sessions.clone());
    let outcome = guard.validate(Some("Bearer tok-1")).await;

    match outcome {
        SessionValidation::Valid { user_id, session } => {
            assert_eq!(user_id, "u-1");
            assert_eq!(session["plan"], json!("pro"));
            assert!(session.get("last_activity").is_some());
        }
        other => panic!("expected valid session, got {:?}", other),
    }

    // The refresh was persisted.
    let stored = sessions.get_user_session("u-1").await.unwrap().unwrap();
    assert!(stored.get("last_activity").is_some());
}

#[tokio::test]
async fn test_session_guard_rejects_each_missing_piece() {
    let sessions = session_store();

    let mut verifier = MockTokenVerifier::new();
    verifier.expect_verify().returning(|token| {
        if token == "good" {
            Some("u-1".to_string())
        } else {
            None
        }
    });
    let guard = SessionGuard::new(Arc::new(verifier), sessions);

    let missing = guard.validate(None).await;
    assert!(!missing.is_valid());
    assert_eq!(missing.status_code(), Some(401));

    let bad_token = guard.validate(Some("Bearer forged")).await;
    assert!(!bad_token.is_valid());

    // Token verifies but no session exists.
    let no_session = guard.validate(Some("Bearer good")).await;
    assert_eq!(
        no_session,
        SessionValidation::Invalid {
            reason: "no active session"
        }
    );
}

#[tokio::test]
async fn test_response_cache_signature_is_query_order_insensitive() {
    let responses = ResponseCache::new(facade());
    let body = json!({"jobs": ["installer", "electrician"]});

    let sig = RequestSignature::new(
        "get",
        "/api/jobs",
        &[
            ("type".to_string(), "full_time".to_string()),
            ("location".to_string(), "MA".to_string()),
        ],
    );
    responses.store(&sig, &body, Duration::from_secs(60)).await;

    let reordered = RequestSignature::new(
        "GET",
        "/api/jobs",
        &[
            ("location".to_string(), "MA".to_string()),
            ("type".to_string(), "full_time".to_string()),
        ],
    );
    assert_eq!(sig.key(), reordered.key());

    let hit = responses.lookup(&reordered).await.unwrap();
    assert_eq!(hit.body, body);
    assert_eq!(hit.cache_header(), ("X-Cache".to_string(), "HIT".to_string()));
}

#[tokio::test]
async fn test_response_cache_custom_key_and_miss() {
    let responses = ResponseCache::new(facade());
    let sig = RequestSignature::from_key("dashboard:u-1");

    assert!(responses.lookup(&sig).await.is_none());
    responses
        .store(&sig, &json!({"widgets": 3}), Duration::from_secs(60))
        .await;
    assert!(responses.lookup(&sig).await.is_some());
}

#[tokio::test]
async fn test_usage_tracker_appends_per_day_records() {
    let tracker = UsageTracker::new(facade());

    tracker.record("GET", "/api/jobs", "1.2.3.4", 200).await;
    tracker.record("POST", "/api/chat", "1.2.3.4", 429).await;

    let today = chrono::Utc::now().date_naive();
    let records = tracker.records_for(today).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].method, "GET");
    assert_eq!(records[1].status, 429);

    assert!(tracker
        .records_for(today.pred_opt().unwrap())
        .await
        .is_empty());
}
