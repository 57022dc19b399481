//! Bearer-credential session validation
//!
//! Token verification is an external collaborator behind a trait; this
//! layer only maps a verified identity to its cached session and keeps
//! the session's activity fresh. Any missing piece (no credential, bad
//! token, no session) is an `Invalid` outcome, never an error.

use async_trait::async_trait;
use chrono::Utc;
use compass_cache::SessionStore;
use serde_json::Value;
use std::sync::Arc;

/// External identity verification: maps a bearer token to a user id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Some(user_id)` for a valid token, `None` otherwise
    async fn verify(&self, token: &str) -> Option<String>;
}

/// Outcome of session validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValidation {
    /// Credential verified and an active session exists
    Valid { user_id: String, session: Value },
    /// Anything short of that
    Invalid { reason: &'static str },
}

impl SessionValidation {
    /// True for a verified, active session
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// HTTP status when authentication is required: 401 on invalid
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { .. } => Some(401),
        }
    }
}

/// Validates inbound credentials against the session store
#[derive(Clone)]
pub struct SessionGuard {
    verifier: Arc<dyn TokenVerifier>,
    sessions: SessionStore,
}

impl SessionGuard {
    /// Create a guard over a verifier and a session store
    pub fn new(verifier: Arc<dyn TokenVerifier>, sessions: SessionStore) -> Self {
        Self { verifier, sessions }
    }

    /// Validate a raw `Authorization` header value.
    ///
    /// On success the session's sliding TTL has already been refreshed
    /// (reading does that) and its `last_activity` field is bumped.
    pub async fn validate(&self, authorization: Option<&str>) -> SessionValidation {
        let Some(header) = authorization else {
            return SessionValidation::Invalid {
                reason: "missing credential",
            };
        };
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        if token.is_empty() {
            return SessionValidation::Invalid {
                reason: "missing credential",
            };
        }

        let Some(user_id) = self.verifier.verify(token).await else {
            return SessionValidation::Invalid {
                reason: "invalid token",
            };
        };

        let session = match self.sessions.get_user_session(&user_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                return SessionValidation::Invalid {
                    reason: "no active session",
                }
            }
            Err(err) => {
                tracing::warn!(user_id, error = %err, "session lookup failed");
                return SessionValidation::Invalid {
                    reason: "session unavailable",
                };
            }
        };

        let mut session = session;
        if let Value::Object(map) = &mut session {
            map.insert(
                "last_activity".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
            if let Err(err) = self.sessions.set_user_session(&user_id, &session).await {
                tracing::warn!(user_id, error = %err, "session activity refresh failed");
            }
        }

        SessionValidation::Valid { user_id, session }
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard").finish_non_exhaustive()
    }
}
