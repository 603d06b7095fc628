use crate::error::Result;
use crate::traits::session::{SessionData, SessionStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory session store implementation
///
/// Suitable for development and testing. Sessions are lost on restart and
/// not shared across instances.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
    default_ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    /// Sign a user in and return the new session id.
    pub async fn sign_in(&self, user_id: &str, email: Option<&str>) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let data = SessionData::for_user(user_id, email, self.default_ttl);
        self.sessions.write().await.insert(session_id.clone(), data);
        session_id
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>> {
        let sessions = self.sessions.read().await;

        match sessions.get(session_id) {
            Some(session) if session.is_expired() => {
                drop(sessions);
                self.sessions.write().await.remove(session_id);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn save(&self, session_id: &str, data: SessionData) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), data);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let initial_len = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok(initial_len - sessions.len())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600 * 24))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_then_load() {
        let store = InMemorySessionStore::new(Duration::from_secs(3600));
        let session_id = store.sign_in("user_1", Some("a@example.com")).await;

        let loaded = store.load(&session_id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id(), Some("user_1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemorySessionStore::new(Duration::from_secs(3600));
        let session_id = store.sign_in("user_1", None).await;

        store.delete(&session_id).await.unwrap();

        assert!(store.load(&session_id).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped_on_load() {
        let store = InMemorySessionStore::new(Duration::from_secs(1));
        store
            .save("short", SessionData::for_user("user_1", None, Duration::from_millis(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.load("short").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = InMemorySessionStore::new(Duration::from_secs(1));
        store
            .save("expired-1", SessionData::new(Duration::from_millis(10)))
            .await
            .unwrap();
        store
            .save("valid-1", SessionData::new(Duration::from_secs(3600)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.load("valid-1").await.unwrap().is_some());
    }
}
