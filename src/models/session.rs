//! Session model
//!
//! A session is a bearer token handed out after a successful login (or on
//! registration). The token string doubles as the primary key; clients
//! present it in the `Authorization` header or the `session` cookie.
//! Sessions are revoked in bulk when a user changes their password.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token, also the primary key
    pub id: String,
    /// The user this session authenticates
    pub user_id: i64,
    /// Expiry; past this point the session is invalid and subject to cleanup
    pub expires_at: DateTime<Utc>,
    /// When the session was issued
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Issue a fresh session for a user, valid for `ttl_days` from now
    pub fn issue(user_id: i64, ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(ttl_days),
            created_at: now,
        }
    }

    /// Whether the session has passed its expiry
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
