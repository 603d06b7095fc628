//! Session lookup for dashboard requests.
//!
//! Authentication itself belongs to the external auth provider. Handlers
//! build a [`RequestContext`] from the incoming request and ask the
//! [`SessionProvider`] held in the app context for the signed-in user.

mod config;
mod in_memory;
pub mod jwt;

pub use config::{SessionBackend, SessionConfig};
pub use in_memory::InMemorySessionStore;
pub use jwt::{AccessClaims, JwtSessionProvider};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use crate::billing::{CustomerRef, Subscription};
use crate::error::Result;
use crate::traits::session::SessionStore;

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session with the user's subscription mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: SessionUser,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl Session {
    #[must_use]
    pub fn new(user_id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            user: SessionUser {
                id: user_id.into(),
                email: email.map(str::to_string),
            },
            subscription: None,
        }
    }

    #[must_use]
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Customer details forwarded to checkout.
    #[must_use]
    pub fn customer(&self) -> CustomerRef<'_> {
        CustomerRef {
            user_id: &self.user.id,
            email: self.user.email.as_deref(),
        }
    }
}

/// Credentials carried by one request: cookies and an optional bearer token.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cookies: HashMap<String, String>,
    bearer: Option<String>,
}

impl RequestContext {
    /// Empty context, as seen for an anonymous request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect cookies and the bearer token from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            for pair in value.split(';') {
                if let Some((name, val)) = pair.trim().split_once('=') {
                    cookies.insert(name.to_string(), val.to_string());
                }
            }
        }

        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Self { cookies, bearer }
    }

    #[must_use]
    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// The configured cookie, falling back to a bearer token when allowed.
    #[must_use]
    pub fn credential(&self, config: &SessionConfig) -> Option<&str> {
        self.cookie(&config.cookie_name)
            .filter(|value| !value.is_empty())
            .or_else(|| {
                if config.allow_bearer {
                    self.bearer_token()
                } else {
                    None
                }
            })
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = std::result::Result<Self, Self::Rejection>> + Send {
        std::future::ready(Ok(Self::from_headers(&parts.headers)))
    }
}

/// Resolves the session for a request.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// `Ok(None)` when the request carries no valid session.
    async fn get_session(&self, ctx: &RequestContext) -> Result<Option<Session>>;
}

/// Session provider backed by a [`SessionStore`].
///
/// The session id is read from the configured cookie, falling back to a
/// bearer token when allowed.
#[derive(Clone)]
pub struct StoreSessionProvider {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl StoreSessionProvider {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl SessionProvider for StoreSessionProvider {
    async fn get_session(&self, ctx: &RequestContext) -> Result<Option<Session>> {
        let Some(session_id) = ctx.credential(&self.config) else {
            return Ok(None);
        };

        let Some(data) = self.store.load(session_id).await? else {
            tracing::debug!(
                target: "dashboard_billing::session",
                "Session id not found or expired"
            );
            return Ok(None);
        };

        let Some(user_id) = data.user_id() else {
            tracing::debug!(
                target: "dashboard_billing::session",
                "Session has no signed-in user"
            );
            return Ok(None);
        };

        let mut session = Session::new(user_id, data.email());
        session.subscription = data.subscription();
        Ok(Some(session))
    }
}

/// Session providers for tests.
#[cfg(any(test, feature = "test-billing"))]
pub mod test {
    use super::*;

    /// Returns the same session for every request.
    #[derive(Debug, Clone, Default)]
    pub struct StaticSessionProvider {
        session: Option<Session>,
    }

    impl StaticSessionProvider {
        #[must_use]
        pub fn signed_in(session: Session) -> Self {
            Self {
                session: Some(session),
            }
        }

        #[must_use]
        pub fn anonymous() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl SessionProvider for StaticSessionProvider {
        async fn get_session(&self, _ctx: &RequestContext) -> Result<Option<Session>> {
            Ok(self.session.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::SubscriptionStatus;
    use crate::traits::session::SessionData;
    use axum::http::HeaderValue;
    use std::time::Duration;

    fn provider(store: &InMemorySessionStore) -> StoreSessionProvider {
        StoreSessionProvider::new(Arc::new(store.clone()), SessionConfig::default())
    }

    #[test]
    fn test_context_parses_cookies_and_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; dashboard_session=abc123"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok_1"));

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.cookie("dashboard_session"), Some("abc123"));
        assert_eq!(ctx.cookie("theme"), Some("dark"));
        assert_eq!(ctx.bearer_token(), Some("tok_1"));
    }

    #[test]
    fn test_context_ignores_malformed_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.bearer_token(), None);
    }

    #[tokio::test]
    async fn test_no_credentials_is_no_session() {
        let store = InMemorySessionStore::default();
        let session = provider(&store).get_session(&RequestContext::new()).await.unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_cookie_session_resolves_user() {
        let store = InMemorySessionStore::default();
        let id = store.sign_in("user_1", Some("a@example.com")).await;
        let ctx = RequestContext::new().with_cookie("dashboard_session", &id);

        let session = provider(&store).get_session(&ctx).await.unwrap().unwrap();
        assert_eq!(session.user.id, "user_1");
        assert_eq!(session.user.email.as_deref(), Some("a@example.com"));
        assert!(session.subscription.is_none());
    }

    #[tokio::test]
    async fn test_session_carries_subscription() {
        let store = InMemorySessionStore::default();
        let sub = Subscription::new(SubscriptionStatus::Active, Some("price_123"));
        store
            .save(
                "sid",
                SessionData::for_user("user_2", None, Duration::from_secs(60))
                    .with_subscription(&sub),
            )
            .await
            .unwrap();

        let ctx = RequestContext::new().with_bearer("sid");
        let session = provider(&store).get_session(&ctx).await.unwrap().unwrap();
        assert_eq!(session.subscription, Some(sub));
    }

    #[tokio::test]
    async fn test_bearer_disabled() {
        let store = InMemorySessionStore::default();
        let id = store.sign_in("user_1", None).await;
        let config = SessionConfig {
            allow_bearer: false,
            ..SessionConfig::default()
        };
        let provider = StoreSessionProvider::new(Arc::new(store), config);

        let ctx = RequestContext::new().with_bearer(&id);
        assert!(provider.get_session(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_session_id() {
        let store = InMemorySessionStore::default();
        let ctx = RequestContext::new().with_cookie("dashboard_session", "missing");
        assert!(provider(&store).get_session(&ctx).await.unwrap().is_none());
    }
}
