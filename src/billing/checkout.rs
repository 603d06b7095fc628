//! Checkout initiation.
//!
//! Turns an "Upgrade" action into either a dashboard redirect (the user is
//! already subscribed) or a hosted checkout session. Each invocation runs a
//! small state machine per tier price:
//!
//! ```text
//! Idle -> Submitting -> Redirecting -> Idle
//!                    \-> Failed    -> Idle
//! ```
//!
//! The loading indicator for a user's price is held by a [`LoadingGuard`],
//! so it is cleared on every exit path, including a dropped request future.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use url::Url;

use super::payment::{
    CheckoutRedirect, CheckoutSession, CreateCheckoutSessionRequest, Navigation, PaymentBackend,
};
use super::subscription::Subscription;
use super::tiers::{Tier, TierCatalog};
use crate::error::{DashboardError, Result};

/// Price selected on a tier card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Stripe price ID.
    pub id: String,
}

impl Price {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Checkout price for a tier card.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for tiers sold outside self-serve checkout: the
    /// free tier and contact-sales tiers.
    pub fn for_tier(tier: &Tier) -> Result<Self> {
        match tier.price_id.as_deref() {
            Some(price_id) if tier.is_purchasable() => Ok(Self::new(price_id)),
            _ if tier.contact_url.is_some() => Err(DashboardError::bad_request(format!(
                "The {} plan is sold through our sales team",
                tier.display_name
            ))),
            _ => Err(DashboardError::bad_request(format!(
                "The {} plan does not require checkout",
                tier.display_name
            ))),
        }
    }

    /// Checkout price for a price id chosen by the client.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when the id belongs to no tier in `catalog`, or to
    /// a tier that is not sold through checkout.
    pub fn from_catalog(catalog: &TierCatalog, price_id: &str) -> Result<Self> {
        let tier = catalog
            .find_by_price(price_id)
            .ok_or_else(|| DashboardError::bad_request(format!("Unknown price {}", price_id)))?;
        Self::for_tier(tier)
    }
}

/// Who the checkout is opened for.
#[derive(Debug, Clone, Copy)]
pub struct CustomerRef<'a> {
    pub user_id: &'a str,
    pub email: Option<&'a str>,
}

/// Checkout state for one tier price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Idle,
    Submitting,
    Redirecting,
    Failed,
}

impl CheckoutState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: CheckoutState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Submitting)
                | (Self::Submitting, Self::Redirecting)
                | (Self::Submitting, Self::Failed)
                | (Self::Redirecting, Self::Idle)
                | (Self::Failed, Self::Idle)
        )
    }

    /// The loading indicator is shown only while submitting.
    #[must_use]
    pub fn is_loading(self) -> bool {
        self == Self::Submitting
    }
}

type IndicatorKey = (String, String);

fn indicator_key(user_id: &str, price_id: &str) -> IndicatorKey {
    (user_id.to_string(), price_id.to_string())
}

/// Checkout states per user and tier price.
///
/// One user's attempt never shows up on another user's page. Absent entries
/// are `Idle`.
#[derive(Debug, Clone, Default)]
pub struct LoadingIndicators {
    states: Arc<Mutex<HashMap<IndicatorKey, CheckoutState>>>,
}

impl LoadingIndicators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IndicatorKey, CheckoutState>> {
        // The map holds plain values; a poisoned lock still has a usable map.
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state of `user_id`'s checkout for `price_id`.
    #[must_use]
    pub fn state(&self, user_id: &str, price_id: &str) -> CheckoutState {
        self.lock()
            .get(&indicator_key(user_id, price_id))
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_loading(&self, user_id: &str, price_id: &str) -> bool {
        self.state(user_id, price_id).is_loading()
    }

    /// Move `user_id`'s checkout for `price_id` to `Submitting`.
    ///
    /// Returns `None` when that user already has a checkout for this price in
    /// flight.
    #[must_use]
    pub fn try_begin(&self, user_id: &str, price_id: &str) -> Option<LoadingGuard> {
        let key = indicator_key(user_id, price_id);
        let mut states = self.lock();
        if states.get(&key) == Some(&CheckoutState::Submitting) {
            return None;
        }
        states.insert(key.clone(), CheckoutState::Submitting);

        Some(LoadingGuard {
            indicators: self.clone(),
            key,
        })
    }

    fn set(&self, key: &IndicatorKey, next: CheckoutState) {
        let mut states = self.lock();
        let current = states.get(key).copied().unwrap_or_default();
        if !current.can_transition_to(next) {
            tracing::warn!(
                target: "dashboard_billing::checkout",
                user_id = %key.0,
                price_id = %key.1,
                from = ?current,
                to = ?next,
                "Ignoring invalid checkout state transition"
            );
            return;
        }
        if next == CheckoutState::Idle {
            states.remove(key);
        } else {
            states.insert(key.clone(), next);
        }
    }
}

/// Holds a user's price in the checkout flow; returns it to `Idle` when
/// dropped.
#[derive(Debug)]
pub struct LoadingGuard {
    indicators: LoadingIndicators,
    key: IndicatorKey,
}

impl LoadingGuard {
    /// Record the terminal state reached by this attempt.
    pub fn finish(&self, state: CheckoutState) {
        self.indicators.set(&self.key, state);
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.indicators.lock().remove(&self.key);
    }
}

/// Result of one checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Already subscribed: go to the dashboard, no session created.
    Dashboard(Navigation),
    /// Session created: navigate to hosted checkout.
    Checkout {
        session_id: String,
        navigation: Navigation,
    },
    /// The attempt failed; `message` is shown to the user.
    Failed { message: String },
    /// The same user's attempt for this price is still submitting.
    InProgress,
}

impl CheckoutOutcome {
    /// State the flow ended in.
    #[must_use]
    pub fn final_state(&self) -> CheckoutState {
        match self {
            Self::Dashboard(_) | Self::Checkout { .. } => CheckoutState::Redirecting,
            Self::Failed { .. } => CheckoutState::Failed,
            Self::InProgress => CheckoutState::Submitting,
        }
    }

    /// Navigation target, if the flow redirects.
    #[must_use]
    pub fn navigation(&self) -> Option<&Navigation> {
        match self {
            Self::Dashboard(nav) => Some(nav),
            Self::Checkout { navigation, .. } => Some(navigation),
            Self::Failed { .. } | Self::InProgress => None,
        }
    }
}

/// Configuration for checkout sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Where hosted checkout returns after payment.
    pub success_url: String,
    /// Where hosted checkout returns when abandoned.
    pub cancel_url: String,
    /// In-app path for already-subscribed users.
    pub dashboard_path: String,
    /// Allow promotion codes on the hosted page.
    pub allow_promotion_codes: bool,
    /// Allowed domains for redirect URLs (empty = allow any HTTPS URL).
    #[serde(default)]
    pub allowed_redirect_domains: Vec<String>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            success_url: "https://localhost/dashboard".to_string(),
            cancel_url: "https://localhost/dashboard/pricing".to_string(),
            dashboard_path: "/dashboard".to_string(),
            allow_promotion_codes: true,
            allowed_redirect_domains: Vec::new(),
        }
    }
}

impl CheckoutConfig {
    #[must_use]
    pub fn new(success_url: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        Self {
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn dashboard_path(mut self, path: impl Into<String>) -> Self {
        self.dashboard_path = path.into();
        self
    }

    #[must_use]
    pub fn allow_promotion_codes(mut self, allow: bool) -> Self {
        self.allow_promotion_codes = allow;
        self
    }

    /// Set allowed redirect domains.
    #[must_use]
    pub fn allowed_redirect_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_redirect_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Validate both return URLs.
    pub fn validate(&self) -> Result<()> {
        self.validate_redirect_url(&self.success_url)?;
        self.validate_redirect_url(&self.cancel_url)
    }

    /// Validate a redirect URL against the allowed domains.
    ///
    /// The URL must parse, use HTTPS, and match an allowed domain (exact or
    /// subdomain) when the allowed list is non-empty.
    pub fn validate_redirect_url(&self, url: &str) -> Result<()> {
        let parsed = Url::parse(url).map_err(|e| {
            DashboardError::bad_request(format!("Invalid redirect URL: {}", e))
        })?;

        if parsed.scheme() != "https" {
            return Err(DashboardError::bad_request("Redirect URL must use HTTPS"));
        }

        if !self.allowed_redirect_domains.is_empty() {
            let host = parsed.host_str().ok_or_else(|| {
                DashboardError::bad_request("Redirect URL must have a host")
            })?;

            let domain_allowed = self.allowed_redirect_domains.iter().any(|allowed| {
                host == allowed || host.ends_with(&format!(".{}", allowed))
            });

            if !domain_allowed {
                return Err(DashboardError::bad_request(format!(
                    "Redirect URL domain '{}' is not allowed",
                    host
                )));
            }
        }

        Ok(())
    }
}

/// Starts checkout flows. Stateless: every call is an independent attempt.
#[derive(Clone)]
pub struct CheckoutInitiator {
    backend: Arc<dyn PaymentBackend>,
    redirect: Arc<dyn CheckoutRedirect>,
    config: CheckoutConfig,
}

impl CheckoutInitiator {
    #[must_use]
    pub fn new(
        backend: Arc<dyn PaymentBackend>,
        redirect: Arc<dyn CheckoutRedirect>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            backend,
            redirect,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Run one checkout attempt.
    ///
    /// Any existing subscription short-circuits to the dashboard without
    /// calling the payment backend; plan changes go through the portal.
    /// Backend and redirect failures become [`CheckoutOutcome::Failed`] with
    /// the error's client-safe message.
    pub async fn initiate(
        &self,
        price: &Price,
        current_subscription: Option<&Subscription>,
        customer: Option<CustomerRef<'_>>,
    ) -> CheckoutOutcome {
        if let Some(subscription) = current_subscription {
            tracing::info!(
                target: "dashboard_billing::checkout",
                price_id = %price.id,
                status = %subscription.status,
                "Subscription exists, redirecting to dashboard"
            );
            return CheckoutOutcome::Dashboard(Navigation::Internal(
                self.config.dashboard_path.clone(),
            ));
        }

        match self.create_and_redirect(price, customer).await {
            Ok((session_id, navigation)) => {
                tracing::info!(
                    target: "dashboard_billing::checkout",
                    price_id = %price.id,
                    session_id = %session_id,
                    "Redirecting to hosted checkout"
                );
                CheckoutOutcome::Checkout {
                    session_id,
                    navigation,
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: "dashboard_billing::checkout",
                    price_id = %price.id,
                    error = %e,
                    "Checkout session request failed"
                );
                CheckoutOutcome::Failed {
                    message: e.safe_message(),
                }
            }
        }
    }

    /// Run one attempt while holding the customer's loading indicator for
    /// the price.
    ///
    /// Returns [`CheckoutOutcome::InProgress`] without doing anything when the
    /// same customer already has an attempt for this price submitting.
    pub async fn initiate_tracked(
        &self,
        price: &Price,
        current_subscription: Option<&Subscription>,
        customer: CustomerRef<'_>,
        indicators: &LoadingIndicators,
    ) -> CheckoutOutcome {
        let Some(guard) = indicators.try_begin(customer.user_id, &price.id) else {
            tracing::debug!(
                target: "dashboard_billing::checkout",
                user_id = customer.user_id,
                price_id = %price.id,
                "Checkout already in progress"
            );
            return CheckoutOutcome::InProgress;
        };

        let outcome = self
            .initiate(price, current_subscription, Some(customer))
            .await;
        guard.finish(outcome.final_state());
        outcome
    }

    /// Create a hosted checkout session for `price` without redirecting.
    ///
    /// # Errors
    ///
    /// Propagates payment backend failures.
    pub async fn create_session(
        &self,
        price: &Price,
        customer: Option<CustomerRef<'_>>,
    ) -> Result<CheckoutSession> {
        if price.id.trim().is_empty() {
            return Err(DashboardError::bad_request("Price id is required"));
        }

        self.backend
            .create_checkout_session(CreateCheckoutSessionRequest {
                price_id: price.id.clone(),
                client_reference_id: customer.map(|c| c.user_id.to_string()),
                customer_email: customer.and_then(|c| c.email).map(str::to_string),
                success_url: self.config.success_url.clone(),
                cancel_url: self.config.cancel_url.clone(),
                allow_promotion_codes: self.config.allow_promotion_codes,
            })
            .await
    }

    async fn create_and_redirect(
        &self,
        price: &Price,
        customer: Option<CustomerRef<'_>>,
    ) -> Result<(String, Navigation)> {
        let session = self.create_session(price, customer).await?;
        let navigation = self.redirect.redirect_to_checkout(&session)?;
        Ok((session.id, navigation))
    }
}
