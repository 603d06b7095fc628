//! Shared harness: the real router over in-memory stores and a scripted
//! payment backend.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use dashboard_billing::billing::{
    CheckoutSession, CreateCheckoutSessionRequest, PortalConfig, PortalLink,
};
use dashboard_billing::session::{InMemorySessionStore, SessionConfig, StoreSessionProvider};
use dashboard_billing::usage::InMemoryUsageStore;
use dashboard_billing::{
    App, AppContext, Config, DashboardError, PaymentBackend, Result, SessionData, SessionProvider,
    SessionStore, Subscription, SubscriptionStatus, TierCatalog,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const PRO_PRICE: &str = "price_123";
pub const SALES_URL: &str = "https://example.com/sales";
pub const PORTAL_URL: &str = "https://billing.stripe.com/p/login/test";
pub const COOKIE: &str = "dashboard_session";

/// Payment backend answering with a fixed session id or a fixed failure.
#[derive(Default)]
pub struct ScriptedBackend {
    session_id: Option<String>,
    failure: Option<String>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CreateCheckoutSessionRequest>>,
}

impl ScriptedBackend {
    pub fn returning(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Blocks the first call after signalling `entered` until `release`
    /// fires; later calls answer at once.
    pub fn gated(session_id: &str, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            gate: Some((entered, release)),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CreateCheckoutSessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentBackend for ScriptedBackend {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if let (0, Some((entered, release))) = (call, &self.gate) {
            entered.notify_one();
            release.notified().await;
        }

        if let Some(message) = &self.failure {
            return Err(DashboardError::payment_backend(message.clone()));
        }

        Ok(CheckoutSession {
            id: self.session_id.clone().unwrap_or_else(|| "cs_test".to_string()),
            url: None,
        })
    }
}

pub struct Harness {
    pub sessions: Arc<InMemorySessionStore>,
    pub usage: Arc<InMemoryUsageStore>,
    pub payments: Arc<ScriptedBackend>,
    pub router: Router,
}

impl Harness {
    pub fn new(payments: ScriptedBackend) -> Self {
        Self::with_usage(InMemoryUsageStore::new(), payments)
    }

    pub fn with_usage(usage: InMemoryUsageStore, payments: ScriptedBackend) -> Self {
        let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(3600)));
        let provider = Arc::new(StoreSessionProvider::new(
            sessions.clone(),
            SessionConfig::default(),
        ));
        Self::build(sessions, provider, usage, payments)
    }

    /// Sessions resolved by `provider` instead of the in-memory store.
    pub fn with_session_provider(
        provider: Arc<dyn SessionProvider>,
        payments: ScriptedBackend,
    ) -> Self {
        let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(3600)));
        Self::build(sessions, provider, InMemoryUsageStore::new(), payments)
    }

    fn build(
        sessions: Arc<InMemorySessionStore>,
        provider: Arc<dyn SessionProvider>,
        usage: InMemoryUsageStore,
        payments: ScriptedBackend,
    ) -> Self {
        let usage = Arc::new(usage);
        let payments = Arc::new(payments);

        let portal = PortalLink::from_config(&PortalConfig::new().url(PORTAL_URL)).unwrap();
        let context = AppContext::builder()
            .with_catalog(TierCatalog::standard(PRO_PRICE, SALES_URL))
            .with_session_provider(provider)
            .with_usage_store(usage.clone())
            .with_payment_backend(payments.clone())
            .with_portal(portal)
            .build()
            .unwrap();

        let router = App::new(Config::default(), context).into_test_router();

        Self {
            sessions,
            usage,
            payments,
            router,
        }
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub async fn sign_in(&self, user_id: &str) -> String {
        self.sessions.sign_in(user_id, Some("user@example.com")).await
    }

    pub async fn sign_in_subscribed(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
        price_id: &str,
    ) -> String {
        let session_id = format!("sess_{}", user_id);
        let data = SessionData::for_user(user_id, None, Duration::from_secs(3600))
            .with_subscription(&Subscription::new(status, Some(price_id)));
        self.sessions.save(&session_id, data).await.unwrap();
        session_id
    }
}
