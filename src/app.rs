use std::sync::Arc;

use crate::billing::{
    CheckoutConfig, CheckoutInitiator, CheckoutRedirect, HostedCheckoutRedirect,
    LoadingIndicators, PaymentBackend, PortalLink, RestSubscriptionStore, TierCatalog,
};
use crate::config::{Config, UsageBackend};
use crate::error::{DashboardError, Result};
use crate::health::{CatalogHealthCheck, HealthChecker};
use crate::session::{
    InMemorySessionStore, JwtSessionProvider, SessionBackend, SessionProvider,
    StoreSessionProvider,
};
use crate::usage::{InMemoryUsageStore, RestUsageStore, UsageReader, UsageStore};
use crate::utils::DataApiConfig;

/// Shared dependencies for request handlers
///
/// Every collaborator is explicit: handlers reach the session provider,
/// usage store and payment backend only through this context.
#[derive(Clone)]
pub struct AppContext {
    pub catalog: Arc<TierCatalog>,
    pub sessions: Arc<dyn SessionProvider>,
    pub usage: UsageReader,
    pub checkout: Arc<CheckoutInitiator>,
    pub indicators: LoadingIndicators,
    pub portal: PortalLink,
    pub health: Arc<HealthChecker>,
}

impl AppContext {
    /// Builder pattern for constructing AppContext
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    /// Wire production collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Fails when a configured backend cannot be created, e.g. a missing or
    /// malformed Stripe key or an unreachable database.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let catalog = config.billing.tier_catalog()?;
        let portal = PortalLink::from_config(&config.billing.portal)?;

        let sessions = build_session_provider(config)?;
        let usage_store = build_usage_store(config).await?;
        let payments = build_payment_backend(config)?;

        AppContextBuilder::new()
            .with_catalog(catalog)
            .with_session_provider(sessions)
            .with_usage_store(usage_store)
            .with_usage_window_days(config.usage.window_days)
            .with_login_path(config.session.login_path.clone())
            .with_payment_backend(payments)
            .with_checkout_redirect(Arc::new(HostedCheckoutRedirect::new(
                config.billing.checkout_base_url.clone(),
            )))
            .with_checkout_config(config.billing.checkout.clone())
            .with_portal(portal)
            .build()
    }
}

/// Data API settings shared by the REST usage store and subscription mirror.
fn data_api_config(config: &Config) -> Option<DataApiConfig> {
    match (&config.usage.rest_url, &config.usage.rest_api_key) {
        (Some(url), Some(key)) => Some(DataApiConfig::new(url.clone(), key.clone())),
        _ => None,
    }
}

fn build_session_provider(config: &Config) -> Result<Arc<dyn SessionProvider>> {
    match config.session.backend {
        SessionBackend::Jwt => {
            let data_api = data_api_config(config).ok_or_else(|| {
                DashboardError::internal(
                    "JWT sessions need SUPABASE_URL and SUPABASE_SERVICE_KEY for subscriptions",
                )
            })?;
            let subscriptions = Arc::new(RestSubscriptionStore::new(data_api)?);
            let provider = JwtSessionProvider::from_config(&config.session, subscriptions)?;
            Ok(Arc::new(provider))
        }
        SessionBackend::Memory => {
            tracing::warn!(
                "Using in-memory sessions; only ids signed in by this process resolve"
            );
            let store = Arc::new(InMemorySessionStore::new(config.session.default_ttl()));
            Ok(Arc::new(StoreSessionProvider::new(
                store,
                config.session.clone(),
            )))
        }
    }
}

async fn build_usage_store(config: &Config) -> Result<Arc<dyn UsageStore>> {
    match config.usage.backend {
        UsageBackend::Memory => {
            tracing::warn!("Using in-memory usage store; usage will be empty");
            Ok(Arc::new(InMemoryUsageStore::new()))
        }
        #[cfg(feature = "database")]
        UsageBackend::Database => {
            let database = config.usage.database.as_ref().ok_or_else(|| {
                DashboardError::internal("Usage database selected without DATABASE_URL")
            })?;
            let store = crate::usage::SeaOrmUsageStore::connect(database).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "database"))]
        UsageBackend::Database => Err(DashboardError::internal(
            "Usage backend 'database' requires the database feature",
        )),
        UsageBackend::Rest => {
            let data_api = data_api_config(config).ok_or_else(|| {
                DashboardError::internal(
                    "Usage REST backend selected without SUPABASE_URL or SUPABASE_SERVICE_KEY",
                )
            })?;
            Ok(Arc::new(RestUsageStore::new(data_api)?))
        }
    }
}

#[cfg(feature = "billing")]
fn build_payment_backend(config: &Config) -> Result<Arc<dyn PaymentBackend>> {
    use crate::billing::{LiveStripeClient, LiveStripeClientConfig};

    let key = config
        .billing
        .stripe_secret_key
        .clone()
        .ok_or_else(|| DashboardError::internal("STRIPE_SECRET_KEY is not set"))?;
    let client = LiveStripeClient::new(key, LiveStripeClientConfig::default())
        .map_err(|e| DashboardError::internal(e.to_string()))?;

    if client.is_test_mode() {
        tracing::info!("Stripe client running in test mode");
    }
    Ok(Arc::new(client))
}

#[cfg(not(feature = "billing"))]
fn build_payment_backend(_config: &Config) -> Result<Arc<dyn PaymentBackend>> {
    Err(DashboardError::internal(
        "No payment backend available; enable the billing feature",
    ))
}

/// Builder for AppContext with fluent API
#[must_use = "builder does nothing until you call build()"]
#[derive(Default)]
pub struct AppContextBuilder {
    catalog: Option<TierCatalog>,
    sessions: Option<Arc<dyn SessionProvider>>,
    usage_store: Option<Arc<dyn UsageStore>>,
    usage_window_days: Option<u32>,
    login_path: Option<String>,
    payments: Option<Arc<dyn PaymentBackend>>,
    redirect: Option<Arc<dyn CheckoutRedirect>>,
    checkout_config: CheckoutConfig,
    portal: PortalLink,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, catalog: TierCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_session_provider(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_usage_store(mut self, store: Arc<dyn UsageStore>) -> Self {
        self.usage_store = Some(store);
        self
    }

    pub fn with_usage_window_days(mut self, days: Option<u32>) -> Self {
        self.usage_window_days = days;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    pub fn with_payment_backend(mut self, backend: Arc<dyn PaymentBackend>) -> Self {
        self.payments = Some(backend);
        self
    }

    /// Defaults to Stripe-hosted checkout.
    pub fn with_checkout_redirect(mut self, redirect: Arc<dyn CheckoutRedirect>) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn with_checkout_config(mut self, config: CheckoutConfig) -> Self {
        self.checkout_config = config;
        self
    }

    pub fn with_portal(mut self, portal: PortalLink) -> Self {
        self.portal = portal;
        self
    }

    /// # Errors
    ///
    /// Returns `Internal` when the catalog, session provider, usage store, or
    /// payment backend is missing.
    pub fn build(self) -> Result<AppContext> {
        let catalog = Arc::new(
            self.catalog
                .ok_or_else(|| DashboardError::internal("Tier catalog not configured"))?,
        );
        let sessions = self
            .sessions
            .ok_or_else(|| DashboardError::internal("Session provider not configured"))?;
        let usage_store = self
            .usage_store
            .ok_or_else(|| DashboardError::internal("Usage store not configured"))?;
        let payments = self
            .payments
            .ok_or_else(|| DashboardError::internal("Payment backend not configured"))?;
        let redirect = self
            .redirect
            .unwrap_or_else(|| Arc::new(HostedCheckoutRedirect::default()));

        let mut usage = UsageReader::new(usage_store).window_days(self.usage_window_days);
        if let Some(path) = self.login_path {
            usage = usage.login_path(path);
        }

        let health =
            HealthChecker::new().with_check(Arc::new(CatalogHealthCheck::new(catalog.clone())));

        Ok(AppContext {
            catalog,
            sessions,
            usage,
            checkout: Arc::new(CheckoutInitiator::new(payments, redirect, self.checkout_config)),
            indicators: LoadingIndicators::new(),
            portal: self.portal,
            health: Arc::new(health),
        })
    }
}
