//! Users and authentication sessions.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User identifier (login name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered user. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: &str, name: &str, email: &str) -> Self {
        Self {
            id: UserId::from(id),
            name: name.to_string(),
            email: email.to_string(),
            joined_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Validation("user ID cannot be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("user name cannot be empty".to_string()));
        }
        if !self.email.contains('@') {
            return Err(Error::Validation(format!(
                "user email is not valid: {:?}",
                self.email
            )));
        }
        Ok(())
    }
}

/// An authentication session.
///
/// A session is valid while it is active and not yet expired. Expiry is
/// evaluated lazily whenever the session is inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    /// Opaque bearer token.
    pub token: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Open a fresh active session for `user_id` lasting `ttl` from `now`.
    pub fn open(user_id: UserId, now: DateTime<Utc>, ttl: Duration) -> Result<Self> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| {
                Error::Internal(format!("session expiry out of range: {} + {}", now, ttl))
            })?;
        Ok(Self {
            user_id,
            token: Uuid::new_v4().simple().to_string(),
            active: true,
            created_at: now,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired_at(now)
    }
}
