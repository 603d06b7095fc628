//! Session storage trait
//!
//! The auth provider writes the signed-in user and the subscription mirror
//! into a session record; the dashboard only reads it back by session id.

use crate::billing::{Subscription, SubscriptionStatus};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Well-known keys in [`SessionData`].
pub mod keys {
    pub const USER_ID: &str = "user_id";
    pub const EMAIL: &str = "email";
    pub const SUBSCRIPTION_STATUS: &str = "subscription_status";
    pub const SUBSCRIPTION_PRICE_ID: &str = "subscription_price_id";
}

/// Session record stored in the session store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Session data as key-value pairs
    pub data: HashMap<String, String>,

    /// When the session was created
    pub created_at: SystemTime,

    /// When the session expires
    pub expires_at: SystemTime,
}

impl SessionData {
    /// Create an empty session with expiration
    pub fn new(ttl: Duration) -> Self {
        let now = SystemTime::now();
        Self {
            data: HashMap::new(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Session for a signed-in user.
    pub fn for_user(user_id: &str, email: Option<&str>, ttl: Duration) -> Self {
        let mut session = Self::new(ttl);
        session.set(keys::USER_ID, user_id);
        if let Some(email) = email {
            session.set(keys::EMAIL, email);
        }
        session
    }

    /// Attach the user's subscription mirror.
    pub fn with_subscription(mut self, subscription: &Subscription) -> Self {
        self.set(keys::SUBSCRIPTION_STATUS, subscription.status.as_str());
        match subscription.price_id.as_deref() {
            Some(price_id) => self.set(keys::SUBSCRIPTION_PRICE_ID, price_id),
            None => {
                self.remove(keys::SUBSCRIPTION_PRICE_ID);
            }
        }
        self
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() > self.expires_at
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.data.remove(key)
    }

    /// Signed-in user id, if the record carries one.
    pub fn user_id(&self) -> Option<&str> {
        self.get(keys::USER_ID).filter(|id| !id.is_empty())
    }

    pub fn email(&self) -> Option<&str> {
        self.get(keys::EMAIL)
    }

    /// Subscription mirror, present once a status has been recorded.
    pub fn subscription(&self) -> Option<Subscription> {
        let status = self.get(keys::SUBSCRIPTION_STATUS)?;
        Some(Subscription::new(
            SubscriptionStatus::from_stripe(status),
            self.get(keys::SUBSCRIPTION_PRICE_ID),
        ))
    }
}

/// Session storage trait
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load session data by session ID
    ///
    /// Returns `Ok(None)` if the session doesn't exist or has expired.
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>>;

    /// Save session data with a session ID
    async fn save(&self, session_id: &str, data: SessionData) -> Result<()>;

    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Remove expired sessions, returning how many were dropped.
    async fn cleanup_expired(&self) -> Result<usize>;

    fn is_healthy(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_round_trip() {
        let sub = Subscription::new(SubscriptionStatus::Trialing, Some("price_123"));
        let session =
            SessionData::for_user("user_1", Some("a@example.com"), Duration::from_secs(60))
                .with_subscription(&sub);

        assert_eq!(session.user_id(), Some("user_1"));
        assert_eq!(session.email(), Some("a@example.com"));
        assert_eq!(session.subscription(), Some(sub));
    }

    #[test]
    fn test_no_subscription_without_status() {
        let mut session = SessionData::for_user("user_1", None, Duration::from_secs(60));
        session.set(keys::SUBSCRIPTION_PRICE_ID, "price_123");

        assert_eq!(session.subscription(), None);
    }

    #[test]
    fn test_empty_user_id_is_anonymous() {
        let session = SessionData::for_user("", None, Duration::from_secs(60));
        assert_eq!(session.user_id(), None);
    }
}
