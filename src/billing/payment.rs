//! Payment backend seams.
//!
//! [`PaymentBackend`] creates hosted checkout sessions server-side.
//! [`CheckoutRedirect`] turns a created session into a browser navigation,
//! the server-side counterpart of Stripe.js `redirectToCheckout`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};

/// Checkout session returned by the payment backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    /// Stripe checkout session ID (`cs_...`).
    pub id: String,
    /// Hosted checkout URL, when the backend returns one.
    #[serde(default)]
    pub url: Option<String>,
}

/// Request to create a checkout session for one price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutSessionRequest {
    /// Stripe price ID.
    pub price_id: String,
    /// User the session is opened for.
    pub client_reference_id: Option<String>,
    /// Prefilled customer email.
    pub customer_email: Option<String>,
    /// URL to redirect to on success.
    pub success_url: String,
    /// URL to redirect to on cancel.
    pub cancel_url: String,
    /// Allow promotion codes.
    pub allow_promotion_codes: bool,
}

/// Where the browser should go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum Navigation {
    /// A path inside this application.
    Internal(String),
    /// An externally hosted page (checkout, portal).
    External(String),
}

impl Navigation {
    /// Target location, regardless of kind.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Internal(path) | Self::External(path) => path,
        }
    }
}

/// Server-side payment backend operations.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Create a checkout session for a single subscription price.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession>;
}

/// Navigation primitive handing a session to the hosted checkout page.
pub trait CheckoutRedirect: Send + Sync {
    /// Build the navigation to the hosted checkout page for `session`.
    fn redirect_to_checkout(&self, session: &CheckoutSession) -> Result<Navigation>;
}

/// Redirects to Stripe-hosted checkout.
///
/// Uses the URL returned with the session when present, otherwise
/// `{base_url}/{session_id}`.
#[derive(Debug, Clone)]
pub struct HostedCheckoutRedirect {
    base_url: String,
}

impl HostedCheckoutRedirect {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for HostedCheckoutRedirect {
    fn default() -> Self {
        Self::new("https://checkout.stripe.com/c/pay")
    }
}

impl CheckoutRedirect for HostedCheckoutRedirect {
    fn redirect_to_checkout(&self, session: &CheckoutSession) -> Result<Navigation> {
        if session.id.trim().is_empty() {
            return Err(DashboardError::payment_backend(
                "Checkout session is missing an id",
            ));
        }

        let url = match &session.url {
            Some(url) => url.clone(),
            None => format!("{}/{}", self.base_url, session.id),
        };

        Ok(Navigation::External(url))
    }
}

/// Mock payment backend for testing.
#[cfg(any(test, feature = "test-billing"))]
pub mod test {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    /// Records every request and answers with a canned result.
    #[derive(Default)]
    pub struct MockPaymentBackend {
        session_counter: AtomicU64,
        calls: AtomicUsize,
        fixed_session_id: Option<String>,
        failure: Option<String>,
        requests: Mutex<Vec<CreateCheckoutSessionRequest>>,
    }

    impl MockPaymentBackend {
        /// Mock returning `cs_test_N` sessions.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Mock always returning the given session id.
        #[must_use]
        pub fn with_session_id(id: &str) -> Self {
            Self {
                fixed_session_id: Some(id.to_string()),
                ..Self::default()
            }
        }

        /// Mock whose every call fails with `message`.
        #[must_use]
        pub fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::default()
            }
        }

        /// Number of `create_checkout_session` calls made.
        #[must_use]
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Requests received so far.
        #[must_use]
        pub fn requests(&self) -> Vec<CreateCheckoutSessionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl PaymentBackend for MockPaymentBackend {
        async fn create_checkout_session(
            &self,
            request: CreateCheckoutSessionRequest,
        ) -> Result<CheckoutSession> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }

            if let Some(message) = &self.failure {
                return Err(DashboardError::payment_backend(message.clone()));
            }

            let id = self.fixed_session_id.clone().unwrap_or_else(|| {
                format!("cs_test_{}", self.session_counter.fetch_add(1, Ordering::SeqCst))
            });
            Ok(CheckoutSession {
                url: Some(format!("https://checkout.stripe.com/c/pay/{}", id)),
                id,
            })
        }
    }

    /// Records the sessions it was asked to redirect to.
    #[derive(Default)]
    pub struct RecordingRedirect {
        redirected: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingRedirect {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Redirect that always fails, e.g. a payment client that failed to load.
        #[must_use]
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Session ids passed to `redirect_to_checkout`.
        #[must_use]
        pub fn redirected_session_ids(&self) -> Vec<String> {
            self.redirected.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    impl CheckoutRedirect for RecordingRedirect {
        fn redirect_to_checkout(&self, session: &CheckoutSession) -> Result<Navigation> {
            if let Ok(mut redirected) = self.redirected.lock() {
                redirected.push(session.id.clone());
            }
            if self.fail {
                return Err(DashboardError::payment_backend("Payment client unavailable"));
            }
            Ok(Navigation::External(format!(
                "https://checkout.stripe.com/c/pay/{}",
                session.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test::MockPaymentBackend;
    use super::*;

    fn request() -> CreateCheckoutSessionRequest {
        CreateCheckoutSessionRequest {
            price_id: "price_123".to_string(),
            client_reference_id: Some("user_1".to_string()),
            customer_email: None,
            success_url: "https://example.com/dashboard".to_string(),
            cancel_url: "https://example.com/dashboard/pricing".to_string(),
            allow_promotion_codes: true,
        }
    }

    #[test]
    fn test_hosted_redirect_prefers_session_url() {
        let redirect = HostedCheckoutRedirect::default();
        let session = CheckoutSession {
            id: "cs_abc".to_string(),
            url: Some("https://checkout.stripe.com/c/pay/cs_abc#frag".to_string()),
        };

        let nav = redirect.redirect_to_checkout(&session).unwrap();
        assert_eq!(
            nav,
            Navigation::External("https://checkout.stripe.com/c/pay/cs_abc#frag".to_string())
        );
    }

    #[test]
    fn test_hosted_redirect_builds_url_from_id() {
        let redirect = HostedCheckoutRedirect::new("https://pay.example.com/checkout/");
        let session = CheckoutSession { id: "cs_abc".to_string(), url: None };

        let nav = redirect.redirect_to_checkout(&session).unwrap();
        assert_eq!(nav.location(), "https://pay.example.com/checkout/cs_abc");
    }

    #[test]
    fn test_hosted_redirect_rejects_empty_id() {
        let redirect = HostedCheckoutRedirect::default();
        let session = CheckoutSession { id: " ".to_string(), url: None };

        assert!(redirect.redirect_to_checkout(&session).is_err());
    }

    #[tokio::test]
    async fn test_mock_backend_counts_calls() {
        let backend = MockPaymentBackend::new();

        let first = backend.create_checkout_session(request()).await.unwrap();
        let second = backend.create_checkout_session(request()).await.unwrap();

        assert!(first.id.starts_with("cs_test_"));
        assert_ne!(first.id, second.id);
        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.requests()[0].price_id, "price_123");
    }

    #[tokio::test]
    async fn test_mock_backend_failure() {
        let backend = MockPaymentBackend::failing("network down");
        let err = backend.create_checkout_session(request()).await.unwrap_err();

        assert!(err.to_string().contains("network down"));
        assert_eq!(backend.call_count(), 1);
    }

    #[test]
    fn test_navigation_serializes_with_kind() {
        let nav = Navigation::Internal("/dashboard".to_string());
        let json = serde_json::to_value(&nav).unwrap();
        assert_eq!(json["kind"], "internal");
        assert_eq!(json["location"], "/dashboard");
    }
}
